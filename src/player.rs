use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use crate::config::PlayerConfig;

const URL_PLACEHOLDER: &str = "%URL%";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launch {
    Command { program: String, args: Vec<String> },
    Browser,
}

/// Resolves how `url` will be opened. A command without `%URL%` gets the URL appended.
pub fn plan(cfg: &PlayerConfig, url: &str) -> Result<Launch> {
    if url.trim().is_empty() {
        return Err(anyhow!("player: video has no media url"));
    }
    let Some((program, rest)) = cfg.command.split_first() else {
        return Ok(Launch::Browser);
    };
    let mut substituted = false;
    let mut args: Vec<String> = rest
        .iter()
        .map(|arg| {
            if arg.contains(URL_PLACEHOLDER) {
                substituted = true;
                arg.replace(URL_PLACEHOLDER, url)
            } else {
                arg.clone()
            }
        })
        .collect();
    if !substituted {
        args.push(url.to_string());
    }
    Ok(Launch::Command {
        program: program.clone(),
        args,
    })
}

pub fn play(cfg: &PlayerConfig, url: &str) -> Result<()> {
    match plan(cfg, url)? {
        Launch::Browser => {
            webbrowser::open(url).with_context(|| format!("player: open {url} in browser"))?;
            info!(url, "opened media in browser");
        }
        Launch::Command { program, args } => {
            spawn_player(&program, &args)?;
            info!(program = %program, url, "launched external player");
        }
    }
    Ok(())
}

/// Starts the player with its stdio detached from the terminal. A watcher
/// thread reaps the child when it exits.
fn spawn_player(program: &str, args: &[String]) -> Result<JoinHandle<Option<ExitStatus>>> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("player: launch {program}"))?;
    Ok(thread::spawn(move || match child.wait() {
        Ok(status) => {
            info!(%status, "external player exited");
            Some(status)
        }
        Err(err) => {
            warn!(error = %err, "external player wait failed");
            None
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(command: &[&str]) -> PlayerConfig {
        PlayerConfig {
            command: command.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn empty_command_uses_browser() {
        assert_eq!(plan(&cfg(&[]), "https://v/1.mp4").unwrap(), Launch::Browser);
    }

    #[test]
    fn placeholder_is_substituted() {
        let launch = plan(&cfg(&["mpv", "--fs", "%URL%"]), "https://v/1.mp4").unwrap();
        assert_eq!(
            launch,
            Launch::Command {
                program: "mpv".into(),
                args: vec!["--fs".into(), "https://v/1.mp4".into()],
            }
        );
    }

    #[test]
    fn url_is_appended_without_placeholder() {
        let launch = plan(&cfg(&["vlc"]), "https://v/1.mp4").unwrap();
        assert_eq!(
            launch,
            Launch::Command {
                program: "vlc".into(),
                args: vec!["https://v/1.mp4".into()],
            }
        );
    }

    #[test]
    fn missing_url_is_an_error() {
        assert!(plan(&cfg(&["mpv"]), "  ").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn launched_player_is_reaped() {
        let watcher = spawn_player("sh", &["-c".into(), "exit 3".into()]).unwrap();
        let status = watcher.join().unwrap().expect("exit status");
        assert_eq!(status.code(), Some(3));
    }

    #[test]
    fn unknown_player_is_an_error() {
        let err = spawn_player("zutube-no-such-player", &[]).unwrap_err();
        assert!(format!("{err:#}").contains("player: launch zutube-no-such-player"));
    }
}
