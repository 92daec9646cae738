use std::{cell::RefCell, ffi::OsStr, str::FromStr};

/// Instruction bound for `run` when none is given.
pub const DEFAULT_MAX_STEPS: usize = 10_000;
/// Bytes of memory included in a state snapshot.
pub const DEFAULT_MEMORY_WINDOW: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Env {
    max_steps: usize,
    memory_window: usize,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

/// Read configuration from `ISA16_MAX_STEPS` and `ISA16_MEMORY_WINDOW`.
///
/// Unset or malformed variables fall back to their defaults.
pub fn init() {
    let value = Env {
        max_steps: var_or("ISA16_MAX_STEPS", DEFAULT_MAX_STEPS),
        memory_window: var_or("ISA16_MEMORY_WINDOW", DEFAULT_MEMORY_WINDOW),
    };
    set_env(value);
}

pub fn max_steps() -> usize {
    with_env(|env| env.max_steps)
}

pub fn memory_window() -> usize {
    with_env(|env| env.memory_window)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

fn var_or<T: FromStr>(name: impl AsRef<OsStr>, default: T) -> T {
    let name = name.as_ref();
    match std::env::var(name) {
        Ok(value) => parse_or(&value, default).unwrap_or_else(|default| {
            log::warn!("ignoring malformed {:?}={:?}", name, value);
            default
        }),
        Err(_) => default,
    }
}

/// `Err` carries the default back when `value` does not parse.
fn parse_or<T: FromStr>(value: &str, default: T) -> Result<T, T> {
    value.trim().parse().map_err(|_| default)
}
