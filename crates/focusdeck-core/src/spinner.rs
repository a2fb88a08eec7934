use rand::Rng;
use tracing::debug;

use crate::store::{self, Store};

const OPTIONS_KEY: &str = "spinner-options";

/// Number of intermediate picks shown before the final selection lands.
const SHUFFLE_STEPS: usize = 20;

pub fn default_options() -> Vec<String> {
    [
        "Drink Water 💧",
        "Stretch 🧘",
        "5 Jumping Jacks 🏃",
        "Check 1 Email 📧",
        "Deep Breath 🌬️",
        "Pet a Cat/Dog 🐶",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinOutcome {
    /// The teaser sequence of intermediate picks.
    pub shuffle: Vec<String>,
    pub selection: String,
}

/// Randomizer widget over a user-editable option list.
#[derive(Debug)]
pub struct Spinner {
    options: Vec<String>,
}

impl Spinner {
    #[tracing::instrument(skip(store))]
    pub fn load(store: &dyn Store) -> Self {
        let options =
            store::load_json::<Vec<String>>(store, OPTIONS_KEY).unwrap_or_else(default_options);
        debug!(count = options.len(), "loaded spinner options");
        Self { options }
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn add_option(&mut self, store: &mut dyn Store, option: &str) -> bool {
        let option = option.trim();
        if option.is_empty() {
            return false;
        }
        self.options.push(option.to_string());
        self.save(store);
        true
    }

    pub fn remove_option(&mut self, store: &mut dyn Store, index: usize) -> bool {
        if index >= self.options.len() {
            return false;
        }
        self.options.remove(index);
        self.save(store);
        true
    }

    /// Spins the wheel: a short teaser shuffle followed by the final pick.
    /// An empty option list can't spin.
    pub fn spin<R: Rng>(&self, rng: &mut R) -> Option<SpinOutcome> {
        if self.options.is_empty() {
            return None;
        }

        let pick = |rng: &mut R| self.options[rng.gen_range(0..self.options.len())].clone();
        let shuffle = (0..SHUFFLE_STEPS).map(|_| pick(rng)).collect();
        Some(SpinOutcome {
            shuffle,
            selection: pick(rng),
        })
    }

    fn save(&self, store: &mut dyn Store) {
        store::save_json(store, OPTIONS_KEY, &self.options);
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::{SHUFFLE_STEPS, Spinner, default_options};
    use crate::store::MemoryStore;

    #[test]
    fn first_run_is_seeded_with_defaults() {
        let store = MemoryStore::new();
        let spinner = Spinner::load(&store);
        assert_eq!(spinner.options(), default_options().as_slice());
    }

    #[test]
    fn spin_picks_from_the_option_list() {
        let mut store = MemoryStore::new();
        let mut spinner = Spinner::load(&store);
        // Leave a single option so the outcome is forced.
        while spinner.options().len() > 1 {
            spinner.remove_option(&mut store, 0);
        }

        let mut rng = StdRng::seed_from_u64(7);
        let outcome = spinner.spin(&mut rng).expect("spin");
        assert_eq!(outcome.shuffle.len(), SHUFFLE_STEPS);
        assert_eq!(outcome.selection, spinner.options()[0]);
    }

    #[test]
    fn empty_options_cannot_spin() {
        let mut store = MemoryStore::new();
        let mut spinner = Spinner::load(&store);
        while !spinner.options().is_empty() {
            spinner.remove_option(&mut store, 0);
        }

        let mut rng = StdRng::seed_from_u64(7);
        assert!(spinner.spin(&mut rng).is_none());
    }

    #[test]
    fn edits_survive_reload() {
        let mut store = MemoryStore::new();
        let mut spinner = Spinner::load(&store);
        assert!(spinner.add_option(&mut store, "Walk around the block"));
        assert!(!spinner.add_option(&mut store, "  "));

        let reloaded = Spinner::load(&store);
        assert_eq!(
            reloaded.options().last().map(String::as_str),
            Some("Walk around the block")
        );
    }
}
