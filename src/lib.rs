use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

pub mod analyzer;
pub mod api;
pub mod board;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod generator;
pub mod init;
pub mod layout;
pub mod platform;
pub mod puzzle;
pub mod reaction;
pub mod render;
pub mod story;
pub mod svg;
pub mod template;
pub mod video;

pub type GeneratorLogHook = Arc<Mutex<dyn Fn(&str) + Send + Sync + 'static>>;

static LOG_HOOK: Lazy<Mutex<Option<GeneratorLogHook>>> = Lazy::new(|| Mutex::new(None));

/// Routes tagged log lines to `hook` in addition to tracing.
pub fn set_log_hook(hook: Option<GeneratorLogHook>) {
    if let Ok(mut guard) = LOG_HOOK.lock() {
        *guard = hook;
    }
}

pub(crate) fn logv(tag: &str, message: &str) {
    let hooked = match LOG_HOOK.lock() {
        Ok(guard) => match guard.as_ref() {
            Some(hook) => {
                if let Ok(callback) = hook.lock() {
                    callback(&format!("[{}] {}", tag, message));
                }
                true
            }
            None => false,
        },
        Err(_) => false,
    };

    if hooked {
        tracing::debug!(tag, "{}", message);
        return;
    }

    match tag {
        "WARN" => tracing::warn!("{}", message),
        "OK" => tracing::info!(ok = true, "{}", message),
        _ => tracing::info!("{}", message),
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}
