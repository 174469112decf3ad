use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, Table};
use console::{style, Emoji};
use human_bytes::human_bytes;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tgvault_core::models::{Item, ItemKind, TorrentTask};

pub fn print_banner() {
    println!();
    println!("{}", style("  tgvault  ").bold().white().on_blue());
    println!("{}", style("  Telegram-backed cloud drive — operator CLI  ").dim());
    println!();
}

pub fn print_success(message: &str) {
    println!("{} {}", Emoji("✅", "OK"), style(message).green());
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", Emoji("❌", "Error"), style(message).red());
}

pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.blue} {msg}")
            .expect("invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn kind_label(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Folder => "folder",
        ItemKind::Image => "image",
        ItemKind::Video => "video",
        ItemKind::Audio => "audio",
        ItemKind::Document => "document",
        ItemKind::Archive => "archive",
        ItemKind::Code => "code",
        ItemKind::Other => "other",
    }
}

pub fn print_item_list(items: Vec<Item>) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Name").add_attribute(Attribute::Bold).fg(Color::Cyan),
        Cell::new("Kind").add_attribute(Attribute::Bold).fg(Color::Yellow),
        Cell::new("Size").add_attribute(Attribute::Bold).fg(Color::Green),
        Cell::new("Path").add_attribute(Attribute::Bold).fg(Color::Magenta),
        Cell::new("Id").add_attribute(Attribute::Bold),
    ]);

    for item in items {
        table.add_row(vec![
            Cell::new(&item.name),
            Cell::new(kind_label(item.kind)),
            Cell::new(human_bytes(item.size as f64)),
            Cell::new(&item.path),
            Cell::new(item.id.map(|i| i.to_hex()).unwrap_or_default()),
        ]);
    }

    println!("{table}");
}

pub fn print_torrent_list(tasks: Vec<TorrentTask>) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Name").add_attribute(Attribute::Bold).fg(Color::Cyan),
        Cell::new("Status").add_attribute(Attribute::Bold).fg(Color::Yellow),
        Cell::new("Progress").add_attribute(Attribute::Bold).fg(Color::Green),
        Cell::new("Id").add_attribute(Attribute::Bold),
    ]);

    for task in tasks {
        table.add_row(vec![
            Cell::new(&task.name),
            Cell::new(format!("{:?}", task.status)),
            Cell::new(format!("{:.1}%", task.progress * 100.0)),
            Cell::new(task.id.map(|i| i.to_hex()).unwrap_or_default()),
        ]);
    }

    println!("{table}");
}
