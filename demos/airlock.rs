/// Airlock example: a scripted session against a small terminal document.
///
/// A sequence: banner types out → operator logs in → door refuses a
/// stranger → operator returns as Sonya → door opens and shows the
/// passphrase minted on the login screen.
///
/// Run with: cargo run --example airlock

use phosphor_engine::core::reveal::LifecycleEvent;
use phosphor_engine::schema::action::{Command, SingleAction};
use phosphor_engine::Interpreter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut terminal = Interpreter::builder()
        .document_file("demos/airlock.json")
        .seed(2026)
        .columns(48)
        .tick_ms(50)
        .meta_commands(vec![Command::literal(
            &["whoami"],
            SingleAction::set("asked", true),
        )])
        .build()
        .expect("Failed to build interpreter");

    // --- Boot: tick the banner out the way a host frame loop would ---
    terminal.start().expect("Failed to start");
    let mut frames = 0;
    loop {
        let events = terminal.tick().expect("Tick failed");
        frames += 1;
        let banner = terminal.render("banner").expect("No banner");
        println!("frame {:>2}: {}{}", frames, banner.slice.revealed, banner.slice.cursor);
        if events.contains(&LifecycleEvent::Done("login-prompt".into())) {
            break;
        }
    }
    print_screen(&terminal);

    // --- A stranger tries the door ---
    type_line(&mut terminal, "whoami");
    type_line(&mut terminal, "bob");
    type_line(&mut terminal, "open");
    if let Some(dialog) = terminal.dialog() {
        println!("[dialog {}] {}", dialog.id, dialog.content.join(" "));
    }
    terminal.dismiss_dialog();

    // --- Back out and return as Sonya ---
    type_line(&mut terminal, "back");
    terminal.skip_reveal().expect("Skip failed");
    type_line(&mut terminal, "sonya");
    type_line(&mut terminal, "pressure");
    type_line(&mut terminal, "open");
    print_screen(&terminal);

    println!("--- Final variables ---");
    for (name, value) in terminal.store().iter() {
        println!("  {} = {}", name, value);
    }
}

fn type_line(terminal: &mut Interpreter, line: &str) {
    println!("> {}", line);
    match terminal.submit(line) {
        Ok(outcome) if !outcome.matched => println!("  (no command matched)"),
        Ok(outcome) => {
            if let Some(target) = outcome.target() {
                println!("  -> {}", target);
            }
        }
        Err(e) => println!("  ERROR: {}", e),
    }
}

fn print_screen(terminal: &Interpreter) {
    println!(
        "\n=== {} ===",
        terminal.current_screen_id().unwrap_or("?")
    );
    for item in terminal.render_screen().expect("Render failed") {
        println!("{}", item.slice.revealed);
    }
    println!();
}
