//! Terminal rendering.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use arcade_core::{Identity, Item, Purchase};
use arcade_storefront::{Notice, NoticeLevel, Route};

pub fn line(text: &str) {
    println!("{text}");
}

pub fn failure(text: &str) {
    eprintln!("error: {text}");
}

pub fn notices(notices: &[Notice]) {
    for notice in notices {
        let marker = match notice.level {
            NoticeLevel::Info => "*",
            NoticeLevel::Error => "!",
        };
        let hint = notice.action.map(route_hint).unwrap_or_default();
        eprintln!("{marker} {}: {}{hint}", notice.title, notice.message);
    }
}

fn route_hint(route: Route) -> &'static str {
    match route {
        Route::Login => " (try `arcade auth login`)",
        Route::Account => " (try `arcade wallet add <amount>`)",
        Route::Library => " (see `arcade library`)",
        Route::Cart => " (see `arcade cart list`)",
    }
}

pub fn identity(identity: &Identity) {
    println!(
        "{} <{}>  id {}  balance {}",
        identity.display_name, identity.email, identity.id, identity.balance
    );
}

pub fn items(items: &[Item]) {
    if items.is_empty() {
        println!("(none)");
        return;
    }
    for item in items {
        let discount = if item.discount > 0 {
            format!("  -{}% (was {})", item.discount, item.original_price)
        } else {
            String::new()
        };
        println!(
            "{:>5}  {:<32} {:>9}{discount}  [{}]",
            item.id.as_i64(),
            item.title,
            item.price.to_string(),
            item.tags.join(", ")
        );
    }
}

pub fn item_detail(item: &Item) {
    println!("{} (id {})", item.title, item.id);
    println!("  price    {}", item.price);
    println!("  rating   {:.1}", item.rating);
    println!("  tags     {}", item.tags.join(", "));
    println!("  image    {}", item.image.location());
    if let Some(date) = item.release_date {
        println!("  released {date}");
    }
    if let Some(description) = &item.description {
        println!();
        println!("{description}");
    }
}

pub fn purchases(purchases: &[Purchase]) {
    if purchases.is_empty() {
        println!("(no purchases)");
        return;
    }
    for purchase in purchases {
        let when = purchase
            .purchased_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let refunded = if purchase.is_refunded() { "  refunded" } else { "" };
        println!(
            "{:>5}  {when:<16}  {:>9}  {} item(s){refunded}",
            purchase.id.as_i64(),
            purchase.total.to_string(),
            purchase.items.len()
        );
    }
}
