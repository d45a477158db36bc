//! Command handlers.
//!
//! Each handler drives one part of the [`Storefront`] and prints the result.
//! Outcome messages ("Added to cart", "Insufficient balance", ...) come from
//! the stores as notices and are printed by `main` after the command.

pub mod shell;

use chrono::NaiveDate;
use clap::{Args, Subcommand};
use url::Url;

use arcade_core::{CATEGORIES, CategoryFilter, ItemDraft, ItemId, Money, PurchaseId};
use arcade_storefront::Storefront;
use arcade_storefront::error::user_message;
use arcade_storefront::functions::SyncSource;
use arcade_storefront::image::ImageValidator;
use arcade_storefront::session::{LOGIN_FAILED, REGISTER_FAILED};

use crate::output;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "ARCADE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "ARCADE_PASSWORD", hide_env_values = true)]
        password: String,
        /// Display name (defaults to the email's local part)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Sign out and forget the persisted session
    Logout,
    /// Show the signed-in identity
    Whoami,
    /// Check the persisted session against the backend
    Validate,
}

/// Catalog entry fields shared by create and update.
#[derive(Args)]
pub struct DraftArgs {
    /// Title
    #[arg(short, long)]
    title: String,
    /// Price, e.g. 19.90
    #[arg(short, long)]
    price: Money,
    /// Comma-separated genres
    #[arg(short = 'g', long, value_delimiter = ',')]
    tags: Vec<String>,
    #[arg(short, long)]
    description: Option<String>,
    /// Release date, YYYY-MM-DD
    #[arg(short, long)]
    released: Option<NaiveDate>,
    /// Artwork URL; dropped if it does not load as an image
    #[arg(short, long)]
    image: Option<String>,
}

impl From<DraftArgs> for ItemDraft {
    fn from(args: DraftArgs) -> Self {
        Self {
            title: args.title,
            price: args.price,
            tags: args.tags,
            description: args.description,
            release_date: args.released,
            image_url: args.image,
        }
    }
}

#[derive(Subcommand)]
pub enum CatalogAction {
    /// List the catalog
    List {
        /// Match titles and tags
        #[arg(short, long)]
        search: Option<String>,
        /// Only this category ("All" for every category)
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show one entry
    Show { id: ItemId },
    /// List the known categories
    Categories,
    /// Add an entry
    Create(DraftArgs),
    /// Replace an entry
    Update {
        id: ItemId,
        #[command(flatten)]
        draft: DraftArgs,
    },
    /// Delete an entry
    Delete { id: ItemId },
    /// Check whether a URL can be used as artwork
    CheckImage { url: String },
}

#[derive(Subcommand)]
pub enum CartAction {
    /// Show the cart and its total
    List,
    /// Add a game to the cart
    Add { id: ItemId },
    /// Remove a game from the cart
    Remove { id: ItemId },
}

#[derive(Subcommand)]
pub enum WalletAction {
    /// Show the balance
    Show,
    /// Add funds
    Add { amount: Money },
}

#[derive(Subcommand)]
pub enum PurchasesAction {
    /// List purchases, newest first
    List,
    /// Show one purchase
    Show { id: PurchaseId },
    /// Refund a purchase
    Refund { id: PurchaseId },
}

#[derive(Subcommand)]
pub enum AccountAction {
    /// Change display name and/or email
    Profile {
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        email: Option<String>,
    },
    /// Change the password
    Password {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
}

#[derive(Subcommand)]
pub enum FunctionsAction {
    /// Run the serverless checkout for the signed-in identity
    Checkout,
    /// Push the catalog to the serverless store
    Sync {
        /// Let the function fetch this listing instead of pushing the
        /// current catalog
        #[arg(long)]
        listing: Option<Url>,
    },
}

pub async fn auth(store: &Storefront, action: AuthAction) -> CommandResult {
    let session = store.session();
    match action {
        AuthAction::Login { email, password } => {
            let identity = session
                .login(&email, &password)
                .await
                .map_err(|e| user_message(&e, LOGIN_FAILED))?;
            output::identity(&identity);
        }
        AuthAction::Register {
            email,
            password,
            name,
        } => {
            let identity = session
                .register(&email, &password, name.as_deref())
                .await
                .map_err(|e| user_message(&e, REGISTER_FAILED))?;
            output::identity(&identity);
        }
        AuthAction::Logout => {
            session.logout().await;
            output::line("Signed out.");
        }
        AuthAction::Whoami => match session.current().await {
            Some(identity) => output::identity(&identity),
            None => output::line("Not signed in."),
        },
        AuthAction::Validate => {
            if session.validate_session().await {
                output::line("Session is valid.");
            } else {
                output::line("No valid session.");
            }
        }
    }
    Ok(())
}

pub async fn catalog(store: &Storefront, action: CatalogAction) -> CommandResult {
    let catalog = store.catalog();
    match action {
        CatalogAction::List { search, category } => {
            if let Some(search) = search {
                catalog.set_query(search).await;
            }
            if let Some(category) = category {
                catalog.set_category(CategoryFilter::from_label(&category)).await;
            }
            output::items(&catalog.filtered().await);
        }
        CatalogAction::Show { id } => output::item_detail(&catalog.get(id).await?),
        CatalogAction::Categories => {
            output::line(CategoryFilter::ALL_LABEL);
            for category in CATEGORIES {
                output::line(category);
            }
        }
        CatalogAction::Create(draft) => {
            let item = catalog.create(&draft.into()).await?;
            output::item_detail(&item);
        }
        CatalogAction::Update { id, draft } => {
            let item = catalog.update(id, &draft.into()).await?;
            output::item_detail(&item);
        }
        CatalogAction::Delete { id } => {
            catalog.delete(id).await?;
            output::line(&format!("Deleted {id}."));
        }
        CatalogAction::CheckImage { url } => {
            let validation = ImageValidator::new()?.validate_complete_image_url(&url).await;
            output::line(&format!(
                "format ok: {}  image extension: {}  loads: {}",
                validation.has_valid_format, validation.has_image_extension, validation.can_load
            ));
            match validation.error {
                Some(error) => output::line(&format!("invalid: {error}")),
                None => output::line("valid"),
            }
        }
    }
    Ok(())
}

pub async fn cart(store: &Storefront, action: CartAction) -> CommandResult {
    let cart = store.cart();
    match action {
        CartAction::List => {
            output::items(&cart.items().await);
            output::line(&format!("Total: {}", cart.total().await));
        }
        CartAction::Add { id } => {
            let item = store.catalog().get(id).await?;
            cart.add_to_cart(&item).await?;
        }
        CartAction::Remove { id } => cart.remove_from_cart(id).await?,
    }
    Ok(())
}

pub async fn checkout(store: &Storefront) -> CommandResult {
    let receipt = store.checkout().checkout().await?;
    output::line(&format!(
        "Purchase {}: {} game(s), {}",
        receipt.purchase.id, receipt.item_count, receipt.total
    ));
    output::line(&format!("Balance now {}", store.wallet().balance().await));
    output::items(&store.library().items().await);
    Ok(())
}

pub async fn library(store: &Storefront) -> CommandResult {
    output::items(&store.library().items().await);
    Ok(())
}

pub async fn wallet(store: &Storefront, action: WalletAction) -> CommandResult {
    let wallet = store.wallet();
    match action {
        WalletAction::Show => {
            let balance = wallet.refresh_balance().await?;
            output::line(&format!("Balance: {balance}"));
        }
        WalletAction::Add { amount } => {
            wallet.add_balance(amount).await?;
        }
    }
    Ok(())
}

pub async fn purchases(store: &Storefront, action: PurchasesAction) -> CommandResult {
    match action {
        PurchasesAction::List => output::purchases(&store.history().purchases().await),
        PurchasesAction::Show { id } => {
            let purchase = store.history().get(id).await?;
            output::purchases(std::slice::from_ref(&purchase));
            output::items(&purchase.items);
        }
        PurchasesAction::Refund { id } => {
            store.refund(id).await?;
            output::line(&format!("Balance now {}", store.wallet().balance().await));
        }
    }
    Ok(())
}

pub async fn account(store: &Storefront, action: AccountAction) -> CommandResult {
    match action {
        AccountAction::Profile { name, email } => {
            let identity = store
                .account()
                .update_profile(name.as_deref(), email.as_deref())
                .await?;
            output::identity(&identity);
        }
        AccountAction::Password { current, new } => {
            store.account().change_password(&current, &new).await?;
        }
    }
    Ok(())
}

pub async fn rate(store: &Storefront, item: ItemId, score: u8, comment: &str) -> CommandResult {
    store.ratings().rate(item, score, comment).await?;
    Ok(())
}

pub async fn functions(store: &Storefront, action: FunctionsAction) -> CommandResult {
    let Some(functions) = store.functions() else {
        return Err("Serverless functions are not configured (set ARCADE_FUNCTIONS_URL)".into());
    };
    match action {
        FunctionsAction::Checkout => {
            let result = functions.process_checkout().await?;
            let order = result.order_id.unwrap_or_else(|| "-".to_string());
            let total = result
                .total
                .map_or_else(|| "-".to_string(), |t| Money::new(t).to_string());
            output::line(&format!(
                "success: {}  order: {order}  total: {total}",
                result.success
            ));
            if result.success {
                store.reload().await;
            }
        }
        FunctionsAction::Sync { listing } => {
            let source = match listing {
                Some(url) => SyncSource::Listing(url),
                None => SyncSource::Items(store.catalog().items().await),
            };
            let report = functions.sync_games(&source).await?;
            output::line(&format!(
                "success: {}  synced: {}",
                report.success, report.synced
            ));
        }
    }
    Ok(())
}
