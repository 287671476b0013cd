//! The `peerhelp users` and `peerhelp categories` commands.

use anyhow::Result;
use comfy_table::{Cell, Table};

use super::{GlobalOpts, Session};

pub async fn users(global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global).await?;
    let users = session.forum.users().await;
    if users.is_empty() {
        println!("No users yet. Run `peerhelp init` to seed the default roster.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Role", "Karma"]);
    for u in &users {
        table.add_row(vec![
            Cell::new(u.id),
            Cell::new(&u.name),
            Cell::new(u.role),
            Cell::new(u.karma),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn categories(global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global).await?;
    let categories = session.forum.categories().await;
    if categories.is_empty() {
        println!("No categories yet. Run `peerhelp init` to seed the defaults.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Category"]);
    for c in &categories {
        table.add_row(vec![Cell::new(c.id), Cell::new(&c.name)]);
    }
    println!("{table}");
    Ok(())
}
