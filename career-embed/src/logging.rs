use owo_colors::OwoColorize;
use std::sync::OnceLock;
use supports_color::Stream;
use tracing_subscriber::EnvFilter;

static ANSI_ENABLED: OnceLock<bool> = OnceLock::new();

pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let ansi = detect_ansi();
    let _ = ANSI_ENABLED.set(ansi);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    Ok(())
}

pub fn category_challenge() -> String {
    label("CHALLENGE", |text| format!("{}", text.bright_cyan().bold()))
}

pub fn category_asset() -> String {
    label("ASSET", |text| format!("{}", text.bright_blue().bold()))
}

pub fn category_script() -> String {
    label("SCRIPT", |text| format!("{}", text.bright_magenta().bold()))
}

pub fn category_progress() -> String {
    label("PROGRESS", |text| format!("{}", text.bright_green().bold()))
}

pub fn status_label(status: &str) -> String {
    if !ansi_enabled() {
        return status.to_string();
    }

    match status {
        "correct" => format!("{}", status.bright_green()),
        "already_solved" => format!("{}", status.bright_cyan()),
        "incorrect" => format!("{}", status.bright_yellow()),
        _ => format!("{}", status.bright_red()),
    }
}

fn label(text: &'static str, paint: impl Fn(&str) -> String) -> String {
    if ansi_enabled() {
        paint(text)
    } else {
        text.to_string()
    }
}

fn ansi_enabled() -> bool {
    *ANSI_ENABLED.get_or_init(detect_ansi)
}

fn detect_ansi() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    if std::env::var_os("FORCE_COLOR").is_some() {
        let _ = enable_ansi_support();
        return true;
    }

    let windows_vt = enable_ansi_support().is_ok();
    windows_vt || supports_color::on_cached(Stream::Stdout).is_some()
}

#[cfg(windows)]
fn enable_ansi_support() -> windows::core::Result<()> {
    use windows::Win32::System::Console::{
        ENABLE_VIRTUAL_TERMINAL_PROCESSING, GetConsoleMode, GetStdHandle, STD_OUTPUT_HANDLE,
        SetConsoleMode,
    };

    unsafe {
        let handle = GetStdHandle(STD_OUTPUT_HANDLE)?;
        if handle.is_invalid() {
            return Ok(());
        }

        let mut mode = std::mem::zeroed();
        GetConsoleMode(handle, &mut mode)?;
        SetConsoleMode(handle, mode | ENABLE_VIRTUAL_TERMINAL_PROCESSING)?;
        Ok(())
    }
}

#[cfg(not(windows))]
fn enable_ansi_support() -> Result<(), ()> {
    Err(())
}
