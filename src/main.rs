//! Entry point for the fleetdeck TUI. Parses args, resolves the endpoint
//! profile and runs the App.

use std::env;
use std::io::{self, Write};

use fleetdeck::app::App;
use fleetdeck::config::Config;
use fleetdeck::profiles::{
    load_profiles, save_profiles, ProfileEntry, ProfileRequest, ResolveProfile,
};
use tracing_subscriber::EnvFilter;

struct ParsedArgs {
    api_base: Option<String>,
    ws_url: Option<String>,
    profile: Option<String>,
    save: bool,
    dry_run: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, String> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "fleetdeck".into());
    let mut api_base: Option<String> = None;
    let mut ws_url: Option<String> = None;
    let mut profile: Option<String> = None;
    let mut save = false; // --save
    let mut dry_run = false; // --dry-run

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                return Err(format!(
                    "Usage: {prog} [--ws-url URL|-w URL] [--profile NAME|-P NAME] [--save] [--dry-run] [http://HOST:PORT]"
                ));
            }
            "--ws-url" | "-w" => {
                ws_url = it.next();
            }
            "--profile" | "-P" => {
                profile = it.next();
            }
            "--save" => {
                save = true;
            }
            "--dry-run" => {
                dry_run = true;
            }
            _ if arg.starts_with("--ws-url=") => {
                if let Some((_, v)) = arg.split_once('=') {
                    if !v.is_empty() {
                        ws_url = Some(v.to_string());
                    }
                }
            }
            _ if arg.starts_with("--profile=") => {
                if let Some((_, v)) = arg.split_once('=') {
                    if !v.is_empty() {
                        profile = Some(v.to_string());
                    }
                }
            }
            _ => {
                if api_base.is_none() {
                    api_base = Some(arg);
                } else {
                    return Err(format!(
                        "Unexpected argument. Usage: {prog} [--ws-url URL|-w URL] [--profile NAME|-P NAME] [--save] [--dry-run] [http://HOST:PORT]"
                    ));
                }
            }
        }
    }
    Ok(ParsedArgs {
        api_base,
        ws_url,
        profile,
        save,
        dry_run,
    })
}

// Logging goes nowhere by default: the alternate screen is ours. Set
// FLEETDECK_LOG_STDERR=1 (and RUST_LOG) to see engine logs, e.g. piped to
// a file.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_enabled = matches!(
        std::env::var("FLEETDECK_LOG_STDERR").ok().as_deref(),
        Some("1") | Some("true") | Some("yes")
    );
    if stderr_enabled {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let parsed = match parse_args(env::args()) {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            return Ok(());
        }
    };

    let profiles_file = load_profiles();
    let req = ProfileRequest {
        profile_name: parsed.profile.clone(),
        api_base: parsed.api_base.clone(),
        ws_url: parsed.ws_url.clone(),
    };

    let mut profiles_mut = profiles_file.clone();
    let endpoint: ProfileEntry = match req.resolve(&profiles_file) {
        ResolveProfile::Direct(entry) => {
            // Persist under the profile name when one was given.
            if let Some(name) = parsed.profile.as_ref() {
                match profiles_mut.profiles.get(name) {
                    None => {
                        profiles_mut.profiles.insert(name.clone(), entry.clone());
                        let _ = save_profiles(&profiles_mut);
                    }
                    Some(existing) if existing != &entry => {
                        let overwrite = parsed.save
                            || prompt_yes_no(&format!("Overwrite existing profile '{name}'? [y/N]: "));
                        if overwrite {
                            profiles_mut.profiles.insert(name.clone(), entry.clone());
                            let _ = save_profiles(&profiles_mut);
                        }
                    }
                    Some(_) => {}
                }
            }
            entry
        }
        ResolveProfile::Loaded(entry) => entry,
        ResolveProfile::PromptSelect(names) => {
            eprintln!("Select profile:");
            for (i, n) in names.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, n);
            }
            eprint!("Enter number (or blank to abort): ");
            let _ = io::stderr().flush();
            let mut line = String::new();
            if io::stdin().read_line(&mut line).is_err() {
                return Ok(());
            }
            let Ok(idx) = line.trim().parse::<usize>() else {
                return Ok(());
            };
            match names
                .get(idx.wrapping_sub(1))
                .and_then(|n| profiles_mut.profiles.get(n))
            {
                Some(entry) => entry.clone(),
                None => return Ok(()),
            }
        }
        ResolveProfile::PromptCreate(name) => {
            eprintln!("Profile '{name}' does not exist yet.");
            let base = prompt_string("Enter API base URL (http://HOST:PORT): ")?;
            if base.trim().is_empty() {
                return Ok(());
            }
            let ws = prompt_string("Enter push URL (or leave blank to derive): ")?;
            let entry = ProfileEntry {
                api_base: base.trim().to_string(),
                ws_url: Some(ws.trim().to_string()).filter(|s| !s.is_empty()),
            };
            profiles_mut.profiles.insert(name, entry.clone());
            let _ = save_profiles(&profiles_mut);
            entry
        }
        ResolveProfile::None => {
            eprintln!("No API base URL provided and no profiles to select.");
            return Ok(());
        }
    };

    if parsed.dry_run {
        eprintln!("dry run: would connect to {}", endpoint.api_base);
        return Ok(());
    }

    let cfg = Config::for_base(&endpoint.api_base, endpoint.ws_url.clone());
    let mut app = App::new(cfg);
    app.run().await
}

fn prompt_yes_no(prompt: &str) -> bool {
    eprint!("{prompt}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_ok() {
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    } else {
        false
    }
}

fn prompt_string(prompt: &str) -> io::Result<String> {
    eprint!("{prompt}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}
