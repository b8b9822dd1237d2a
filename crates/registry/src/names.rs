//! Content name generation.

use rand::Rng;
use rand::distributions::Alphanumeric;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Length of generated content names unless configured otherwise.
pub const DEFAULT_NAME_LENGTH: usize = 10;

/// Produces short random names for content objects.
///
/// Names are drawn uniformly from `[a-zA-Z0-9]`, so they are always valid
/// content names. Uniqueness is probabilistic only; collisions are the
/// caller's problem.
#[derive(Debug, Default)]
pub struct NameGenerator {
    script: Option<Mutex<VecDeque<String>>>,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator that hands out `names` in order before falling back to
    /// random names.
    ///
    /// ```
    /// use fetchbox_registry::NameGenerator;
    ///
    /// let names = NameGenerator::scripted(["taken", "fresh"]);
    /// assert_eq!(names.generate(10), "taken");
    /// assert_eq!(names.generate(10), "fresh");
    /// assert_eq!(names.generate(10).len(), 10);
    /// ```
    pub fn scripted(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            script: Some(Mutex::new(names.into_iter().map(Into::into).collect())),
        }
    }

    /// Next candidate name of `length` characters.
    pub fn generate(&self, length: usize) -> String {
        if let Some(script) = &self.script
            // A poisoned script only ever held plain strings.
            && let Some(name) = script.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).pop_front()
        {
            return name;
        }
        generate(length)
    }
}

/// A random name of `length` characters from `[a-zA-Z0-9]`.
pub fn generate(length: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(length).map(char::from).collect()
}
