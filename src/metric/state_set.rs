use crate::errors::MetricError;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct State {
    pub name: String,
    pub enabled: bool,
}

/// Named boolean states of a stateset metric, kept sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StateSet {
    states: Vec<State>,
}

impl StateSet {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, State> {
        self.states.iter()
    }

    fn search(&self, name: &str) -> Result<usize, usize> {
        self.states.binary_search_by(|s| s.name.as_str().cmp(name))
    }

    pub fn read(&self, name: &str) -> Option<&State> {
        self.search(name).ok().map(|idx| &self.states[idx])
    }

    /// Adds a state or replaces the enabled flag of an existing one.
    pub fn create(&mut self, name: &str, enabled: bool) -> Result<(), MetricError> {
        match self.search(name) {
            Ok(idx) => self.states[idx].enabled = enabled,
            Err(idx) => {
                self.states.try_reserve(1)?;
                let mut owned = String::new();
                owned.try_reserve_exact(name.len())?;
                owned.push_str(name);
                self.states.insert(
                    idx,
                    State {
                        name: owned,
                        enabled,
                    },
                );
            }
        }
        Ok(())
    }

    /// Marks `name` as enabled. A name that is not part of the set is ignored and reported as
    /// success, so callers feeding raw status strings do not need to pre-filter them.
    pub fn enable(&mut self, name: &str) -> Result<(), MetricError> {
        if let Ok(idx) = self.search(name) {
            self.states[idx].enabled = true;
        }
        Ok(())
    }

    pub fn try_clone(&self) -> Result<StateSet, MetricError> {
        let mut states = Vec::new();
        states.try_reserve_exact(self.states.len())?;
        for state in self.states.iter() {
            let mut name = String::new();
            name.try_reserve_exact(state.name.len())?;
            name.push_str(&state.name);
            states.push(State {
                name,
                enabled: state.enabled,
            });
        }
        Ok(StateSet { states })
    }

    pub fn reset(&mut self) {
        self.states.clear();
    }
}

impl fmt::Display for StateSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("{")?;
        for (i, state) in self.states.iter().enumerate() {
            if i != 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", state.name, state.enabled)?;
        }
        f.write_str("}")
    }
}

impl<'a> IntoIterator for &'a StateSet {
    type Item = &'a State;
    type IntoIter = std::slice::Iter<'a, State>;

    fn into_iter(self) -> Self::IntoIter {
        self.states.iter()
    }
}
