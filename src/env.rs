//! Process-wide debug/verbose flags read from the environment at startup.
//!
//! Grounded on `original_source/src/direct_bt/DBTEnv.cpp`'s `DBTEnv`:
//! `direct_bt.debug` and `direct_bt.verbose` are read once, `verbose`
//! implies `debug`, and a value can either be the literal `"true"`/
//! `"false"` or a comma-separated list of sub-flags (e.g.
//! `direct_bt.debug=gatt,mgmt`), each of which is exploded into its own
//! `direct_bt.debug.<name>` flag. Logging itself goes through the `log`
//! facade rather than the original's `PLAIN_PRINT`/`ERR_PRINT` macros, so
//! callers configure output with whatever logger they initialize (the
//! `demos/` binaries use `pretty_env_logger`, matching every teacher
//! binary crate).

use std::collections::HashSet;
use std::env;

/// The debug/verbose flags this process was started with, plus any
/// exploded per-topic sub-flags from a comma-separated value.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Env {
    pub debug: bool,
    pub verbose: bool,
    topics: HashSet<String>,
}

impl Env {
    /// Reads `direct_bt.debug` and `direct_bt.verbose` from the process
    /// environment. Call once at startup; the result does not track
    /// later `std::env::set_var` calls.
    pub fn load() -> Env {
        let (debug, debug_topics) = explode("direct_bt.debug");
        let (verbose, verbose_topics) = explode("direct_bt.verbose");
        let mut topics = debug_topics;
        topics.extend(verbose_topics);
        Env {
            debug: debug || verbose,
            verbose,
            topics,
        }
    }

    /// Whether a specific debug topic (one element of a comma-separated
    /// `direct_bt.debug`/`direct_bt.verbose` value) was requested.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.contains(topic)
    }

    /// The `log` crate level these flags imply: `verbose` maps to `Trace`,
    /// plain `debug` to `Debug`, neither to `Info`.
    pub fn default_level_filter(&self) -> log::LevelFilter {
        if self.verbose {
            log::LevelFilter::Trace
        } else if self.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }

    /// Sets `RUST_LOG` to [`Env::default_level_filter`] if the caller
    /// hasn't already set it, so `direct_bt.debug`/`direct_bt.verbose`
    /// give a sensible default for binaries that initialize their logger
    /// with `pretty_env_logger::init()` right after this call. Has no
    /// effect once `RUST_LOG` is already present in the environment.
    pub fn apply_as_default_rust_log(&self) {
        if env::var("RUST_LOG").is_ok() {
            return;
        }
        env::set_var("RUST_LOG", self.default_level_filter().to_string());
    }
}

/// Reads `name` from the environment and interprets it as `DBTEnv`'s
/// `_env_explode_set` does: absent or `"false"` is off, `"true"` is on
/// with no topics, and any other value is a comma-separated topic list
/// (non-empty list implies on).
fn explode(name: &str) -> (bool, HashSet<String>) {
    let value = match env::var(name) {
        Ok(v) => v,
        Err(_) => return (false, HashSet::new()),
    };
    if value == "false" {
        return (false, HashSet::new());
    }
    if value == "true" {
        return (true, HashSet::new());
    }
    let topics: HashSet<String> = value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let enabled = !topics.is_empty();
    (enabled, topics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // std::env is process-global; serialize the tests that touch it.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_var<T>(name: &str, value: Option<&str>, f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap();
        let previous = env::var(name).ok();
        match value {
            Some(v) => env::set_var(name, v),
            None => env::remove_var(name),
        }
        let result = f();
        match previous {
            Some(v) => env::set_var(name, v),
            None => env::remove_var(name),
        }
        result
    }

    #[test]
    fn absent_flags_default_to_off() {
        with_var("direct_bt.debug", None, || {
            with_var("direct_bt.verbose", None, || {
                let e = Env::load();
                assert!(!e.debug);
                assert!(!e.verbose);
            })
        });
    }

    #[test]
    fn verbose_implies_debug() {
        with_var("direct_bt.debug", None, || {
            with_var("direct_bt.verbose", Some("true"), || {
                let e = Env::load();
                assert!(e.verbose);
                assert!(e.debug);
            })
        });
    }

    #[test]
    fn comma_list_explodes_into_topics() {
        with_var("direct_bt.debug", Some("gatt,mgmt"), || {
            with_var("direct_bt.verbose", None, || {
                let e = Env::load();
                assert!(e.debug);
                assert!(e.has_topic("gatt"));
                assert!(e.has_topic("mgmt"));
                assert!(!e.has_topic("hci"));
            })
        });
    }

    #[test]
    fn apply_as_default_rust_log_sets_level_from_debug_flag() {
        with_var("direct_bt.debug", Some("true"), || {
            with_var("direct_bt.verbose", None, || {
                with_var("RUST_LOG", None, || {
                    Env::load().apply_as_default_rust_log();
                    assert_eq!(env::var("RUST_LOG").unwrap(), "DEBUG");
                })
            })
        });
    }

    #[test]
    fn apply_as_default_rust_log_does_not_override_an_existing_value() {
        with_var("direct_bt.debug", Some("true"), || {
            with_var("RUST_LOG", Some("warn"), || {
                Env::load().apply_as_default_rust_log();
                assert_eq!(env::var("RUST_LOG").unwrap(), "warn");
            })
        });
    }

    #[test]
    fn literal_false_is_off() {
        with_var("direct_bt.debug", Some("false"), || {
            with_var("direct_bt.verbose", None, || {
                let e = Env::load();
                assert!(!e.debug);
            })
        });
    }
}
