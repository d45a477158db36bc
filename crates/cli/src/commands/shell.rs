//! Interactive session.
//!
//! Every line typed counts as keyboard activity for the session monitor, so
//! leaving the shell untouched past the idle window signs the user out.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};

use arcade_core::{CategoryFilter, ItemId, Money, PurchaseId};
use arcade_storefront::error::user_message;
use arcade_storefront::session::{ActivityKind, LOGIN_FAILED};
use arcade_storefront::{NoticeLog, Storefront};

use crate::output;

const HELP: &str = "\
commands:
  list                  filtered catalog
  search <text>         set the search text (empty to clear)
  category <name>       set the category (All to clear)
  show <id>             one catalog entry
  add <id> | remove <id>
  cart                  cart contents and total
  checkout
  library
  balance | topup <amount>
  purchases | refund <id>
  rate <id> <score> [comment]
  whoami | login <email> <password> | logout
  focus                 re-check the session now
  reload                refetch everything
  quit";

/// How often notices raised in the background (idle sign-out, expiry) are
/// flushed while waiting for input.
const NOTICE_FLUSH: Duration = Duration::from_millis(500);

pub async fn run(store: &Storefront, notices: &NoticeLog) -> super::CommandResult {
    output::line(HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut flush = tokio::time::interval(NOTICE_FLUSH);

    loop {
        tokio::select! {
            _ = flush.tick() => {
                output::notices(&notices.drain());
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                store.monitor().record_activity(ActivityKind::Keyboard);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if matches!(line, "quit" | "exit") {
                    return Ok(());
                }
                if let Err(e) = execute(store, line).await {
                    output::failure(&e.to_string());
                }
                output::notices(&notices.drain());
            }
        }
    }
}

async fn execute(store: &Storefront, line: &str) -> super::CommandResult {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match command {
        "help" => output::line(HELP),
        "list" => output::items(&store.catalog().filtered().await),
        "search" => {
            store.catalog().set_query(rest).await;
            output::items(&store.catalog().filtered().await);
        }
        "category" => {
            store
                .catalog()
                .set_category(CategoryFilter::from_label(rest))
                .await;
            output::items(&store.catalog().filtered().await);
        }
        "show" => output::item_detail(&store.catalog().get(rest.parse::<ItemId>()?).await?),
        "add" => {
            let item = store.catalog().get(rest.parse::<ItemId>()?).await?;
            store.cart().add_to_cart(&item).await?;
        }
        "remove" => store.cart().remove_from_cart(rest.parse::<ItemId>()?).await?,
        "cart" => {
            output::items(&store.cart().items().await);
            output::line(&format!("Total: {}", store.cart().total().await));
        }
        "checkout" => super::checkout(store).await?,
        "library" => output::items(&store.library().items().await),
        "balance" => {
            let balance = store.wallet().refresh_balance().await?;
            output::line(&format!("Balance: {balance}"));
        }
        "topup" => {
            store.wallet().add_balance(rest.parse::<Money>()?).await?;
        }
        "purchases" => output::purchases(&store.history().purchases().await),
        "refund" => store.refund(rest.parse::<PurchaseId>()?).await?,
        "rate" => {
            let mut parts = rest.splitn(3, ' ');
            let item = parts.next().unwrap_or_default().parse::<ItemId>()?;
            let score = parts.next().unwrap_or_default().parse::<u8>()?;
            let comment = parts.next().unwrap_or_default();
            store.ratings().rate(item, score, comment).await?;
        }
        "whoami" => match store.session().current().await {
            Some(identity) => output::identity(&identity),
            None => output::line("Not signed in."),
        },
        "login" => {
            let (email, password) = rest.split_once(' ').ok_or("usage: login <email> <password>")?;
            let identity = store
                .session()
                .login(email, password.trim())
                .await
                .map_err(|e| user_message(&e, LOGIN_FAILED))?;
            output::identity(&identity);
        }
        "logout" => store.session().logout().await,
        "focus" => store.monitor().focus(),
        "reload" => {
            if !store.reload().await {
                output::line("No valid session.");
            }
        }
        other => return Err(format!("unknown command '{other}' (try `help`)").into()),
    }
    Ok(())
}
