/// Preview: interactive terminal shell for playing through a content document.
///
/// Usage: preview --document <path> [--config <path>] [--columns <n>] [--seed <n>]
///
/// Anything typed that does not start with ':' goes to the current
/// screen's prompt. Shell commands:
///   :tick [n]             advance the reveal n ticks (default 1)
///   :skip                 finish the reveal
///   :screen <id>          jump to a screen
///   :link <id> [shift]    follow a link item
///   :toggle <id>          cycle a toggle item
///   :dismiss              close the open dialog
///   :vars                 list variables
///   :set <name> <value>   write a variable (JSON literal or bare text)
///   :snapshot             print the variables as RON
///   :columns <n>          change the column budget
///   :help                 list commands
///   :quit                 exit

use phosphor_engine::schema::content::LoadState;
use phosphor_engine::schema::value::Value;
use phosphor_engine::{Interpreter, InterpreterError};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut document_path = None;
    let mut config_path = None;
    let mut columns = None;
    let mut seed = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--document" if i + 1 < args.len() => {
                i += 1;
                document_path = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--columns" if i + 1 < args.len() => {
                i += 1;
                columns = args[i].parse::<usize>().ok();
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse::<u64>().ok();
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(document_path) = document_path else {
        eprintln!("--document is required");
        print_usage();
        std::process::exit(1);
    };

    let mut builder = Interpreter::builder().document_file(&document_path);
    if let Some(path) = &config_path {
        builder = builder.config_file(path);
    }
    if let Some(n) = columns {
        builder = builder.columns(n);
    }
    if let Some(s) = seed {
        builder = builder.seed(s);
    }

    let mut interpreter = match builder.build() {
        Ok(interpreter) => interpreter,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let doc = interpreter.document();
    println!("Loaded '{}' by {}", doc.metadata.title, doc.metadata.author);
    println!("{} screens, {} columns", doc.screens.len(), interpreter.columns());
    println!("Type ':help' for commands.\n");

    if let Err(e) = interpreter.start() {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
    show(&interpreter);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{}> ", interpreter.current_screen_id().unwrap_or("?"));
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim_end_matches(['\r', '\n']);

        let Some(command) = line.strip_prefix(':') else {
            match interpreter.submit(line) {
                Ok(outcome) if !outcome.matched => println!("(no command matched)"),
                Ok(_) => {}
                Err(e) => println!("ERROR: {}", e),
            }
            show(&interpreter);
            continue;
        };

        let parts: Vec<&str> = command.split_whitespace().collect();
        let Some(cmd) = parts.first().map(|c| c.to_lowercase()) else {
            continue;
        };

        let result: Result<(), InterpreterError> = match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
                Ok(())
            }
            "tick" => {
                let n = parts.get(1).and_then(|s| s.parse::<usize>().ok()).unwrap_or(1);
                (0..n)
                    .try_for_each(|_| interpreter.tick().map(drop))
                    .map(|()| show(&interpreter))
            }
            "skip" => interpreter.skip_reveal().map(|_| show(&interpreter)),
            "screen" => match parts.get(1) {
                Some(id) => interpreter.activate(id).map(|_| show(&interpreter)),
                None => {
                    println!("Usage: :screen <id>");
                    Ok(())
                }
            },
            "link" => match parts.get(1) {
                Some(id) => {
                    let shift = parts.get(2).is_some_and(|s| *s == "shift");
                    interpreter.follow_link(id, shift).map(|_| show(&interpreter))
                }
                None => {
                    println!("Usage: :link <id> [shift]");
                    Ok(())
                }
            },
            "toggle" => {
                match parts.get(1) {
                    Some(id) => match interpreter.flip_toggle(id) {
                        Some(index) => {
                            println!("Toggle '{}' -> state {}", id, index);
                            show(&interpreter);
                        }
                        None => println!("No toggle '{}'", id),
                    },
                    None => println!("Usage: :toggle <id>"),
                }
                Ok(())
            }
            "dismiss" => {
                match interpreter.dismiss_dialog() {
                    Some(id) => println!("Closed dialog '{}'", id),
                    None => println!("No dialog open"),
                }
                Ok(())
            }
            "vars" => {
                for (name, value) in interpreter.store().iter() {
                    println!("  {} = {} ({})", name, value, value.type_name());
                }
                Ok(())
            }
            "set" => {
                if parts.len() < 3 {
                    println!("Usage: :set <name> <value>");
                } else {
                    let raw = parts[2..].join(" ");
                    let value = serde_json::from_str::<Value>(&raw).unwrap_or_else(|_| Value::from(raw));
                    println!("{} = {}", parts[1], value);
                    interpreter.store_mut().set(parts[1], value);
                }
                Ok(())
            }
            "snapshot" => {
                match interpreter.snapshot().to_ron() {
                    Ok(ron) => println!("{}", ron),
                    Err(e) => println!("ERROR: {}", e),
                }
                Ok(())
            }
            "columns" => {
                match parts.get(1).and_then(|s| s.parse::<usize>().ok()) {
                    Some(n) => {
                        let effective = interpreter.set_columns(n);
                        println!("Columns: {}", effective);
                        show(&interpreter);
                    }
                    None => println!("Columns: {}", interpreter.columns()),
                }
                Ok(())
            }
            _ => {
                println!("Unknown command: ':{}'. Type ':help' for available commands.", cmd);
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("ERROR: {}", e);
        }
    }
}

/// Print the current screen and any open dialog.
fn show(interpreter: &Interpreter) {
    let items = match interpreter.render_screen() {
        Ok(items) => items,
        Err(e) => {
            println!("ERROR: {}", e);
            return;
        }
    };
    println!("--- {} ---", interpreter.current_screen_id().unwrap_or("?"));
    for item in items {
        let mut line = to_terminal(&item.slice.revealed);
        if item.state != LoadState::Done {
            line.push(item.slice.cursor);
        }
        match item.kind {
            "link" | "toggle" => println!("{}    [{} {}]", line, item.kind, item.id),
            _ => println!("{}", line),
        }
    }
    if let Some(dialog) = interpreter.dialog() {
        println!("+-- {:?}: {} --", dialog.kind, dialog.id);
        for line in &dialog.content {
            println!("| {}", line);
        }
        println!("+-- :dismiss to close --");
    }
    println!();
}

/// Drop span markup and decode the escapes the slicer emits.
fn to_terminal(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut in_tag = false;
    for c in markup.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn print_usage() {
    println!("Preview: interactive terminal shell for playing through a content document.");
    println!();
    println!("Usage: preview --document <path> [--config <path>] [--columns <n>] [--seed <n>]");
    println!();
    println!("  --document <path>  Content document (JSON)");
    println!("  --config <path>    Interpreter settings (RON, optional)");
    println!("  --columns <n>      Column budget before the document's clamp");
    println!("  --seed <n>         RNG seed for rule-generated values");
    println!();
    println!("Set RUST_LOG=debug to trace dispatch and variable writes.");
}

fn print_help() {
    println!("Typed lines go to the screen's prompt. Shell commands:");
    println!("  :tick [n]            Advance the reveal n ticks");
    println!("  :skip                Finish the reveal");
    println!("  :screen <id>         Jump to a screen");
    println!("  :link <id> [shift]   Follow a link item");
    println!("  :toggle <id>         Cycle a toggle item");
    println!("  :dismiss             Close the open dialog");
    println!("  :vars                List variables");
    println!("  :set <name> <value>  Write a variable");
    println!("  :snapshot            Print variables as RON");
    println!("  :columns <n>         Change the column budget");
    println!("  :help                Show this help");
    println!("  :quit                Exit");
}
