use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use tracing::trace;

use crate::error::EvalError;

#[derive(Clone)]
enum KeyState<V> {
    Unknown,
    InProgress,
    Completed(V),
    Failed(EvalError),
}

/// Non-blocking lookup handle passed to a computation. Every `get` call is
/// recorded as a required edge from the key under computation to
/// `sub_key`, whether or not it was already `Completed`; a computation
/// must keep calling `get` for every dependency it needs before returning,
/// so the engine sees the full fanout on a single attempt.
pub struct Environment<'e, K, V> {
    engine: &'e Engine<K, V>,
    recorded_deps: RefCell<HashSet<K>>,
    missing: RefCell<bool>,
}

impl<'e, K: Eq + Hash + Clone + Debug, V: Clone> Environment<'e, K, V> {
    fn new(engine: &'e Engine<K, V>) -> Self {
        Self {
            engine,
            recorded_deps: RefCell::new(HashSet::new()),
            missing: RefCell::new(false),
        }
    }

    /// Looks up the value for `sub_key`. Returns `None` and marks this
    /// computation attempt as needing a restart if `sub_key` has not yet
    /// reached `Completed`.
    pub fn get(&self, sub_key: K) -> Option<V> {
        self.recorded_deps.borrow_mut().insert(sub_key.clone());
        match self.engine.state_of(&sub_key) {
            Some(KeyState::Completed(v)) => Some(v),
            Some(KeyState::Failed(_)) | None | Some(KeyState::Unknown) | Some(KeyState::InProgress) => {
                *self.missing.borrow_mut() = true;
                None
            }
        }
    }

    /// Like [`Environment::get`], but surfaces a dependency's terminal
    /// failure to the caller immediately instead of treating it as a
    /// miss — used when a computation wants to fail fast on a
    /// dependency it knows can never become available again.
    pub fn get_or_propagate_failure(&self, sub_key: K) -> Result<Option<V>, EvalError> {
        self.recorded_deps.borrow_mut().insert(sub_key.clone());
        match self.engine.state_of(&sub_key) {
            Some(KeyState::Completed(v)) => Ok(Some(v)),
            Some(KeyState::Failed(e)) => Err(e),
            _ => {
                *self.missing.borrow_mut() = true;
                Ok(None)
            }
        }
    }

    fn recorded_deps(self) -> (HashSet<K>, bool) {
        (self.recorded_deps.into_inner(), self.missing.into_inner())
    }
}

/// The operation a key's computation performs: given the key and an
/// [`Environment`] for looking up dependency values, produce this key's
/// value or a terminal error.
pub trait Computation<K, V> {
    fn compute(&self, key: &K, env: &Environment<'_, K, V>) -> Result<V, EvalError>;
}

impl<K, V, F> Computation<K, V> for F
where
    F: Fn(&K, &Environment<'_, K, V>) -> Result<V, EvalError>,
{
    fn compute(&self, key: &K, env: &Environment<'_, K, V>) -> Result<V, EvalError> {
        self(key, env)
    }
}

/// The demand-driven, memoized evaluation engine: a directed acyclic
/// graph of keys to values with per-key state in
/// `{Unknown, InProgress, Completed, Failed}`. `evaluate` recursively
/// resolves a key's recorded dependencies before retrying it, which plays
/// the role the original restart-based scheduler plays without requiring
/// a separate work queue: the call stack is the queue.
pub struct Engine<K, V> {
    states: RefCell<HashMap<K, KeyState<V>>>,
    deps: RefCell<HashMap<K, HashSet<K>>>,
}

impl<K: Eq + Hash + Clone + Debug, V: Clone> Default for Engine<K, V> {
    fn default() -> Self {
        Self {
            states: RefCell::new(HashMap::new()),
            deps: RefCell::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone + Debug, V: Clone> Engine<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_of(&self, key: &K) -> Option<KeyState<V>> {
        self.states.borrow().get(key).cloned()
    }

    /// The dependency edges recorded for `key` by its most recent
    /// (possibly retried) computation attempt.
    pub fn dependencies_of(&self, key: &K) -> HashSet<K> {
        self.deps.borrow().get(key).cloned().unwrap_or_default()
    }

    pub fn evaluate<C: Computation<K, V>>(&self, root: K, computation: &C) -> Result<V, EvalError> {
        let mut stack = Vec::new();
        self.evaluate_key(&root, computation, &mut stack)
    }

    fn evaluate_key<C: Computation<K, V>>(
        &self,
        key: &K,
        computation: &C,
        stack: &mut Vec<K>,
    ) -> Result<V, EvalError> {
        match self.state_of(key) {
            Some(KeyState::Completed(v)) => return Ok(v),
            Some(KeyState::Failed(e)) => return Err(e),
            _ => {}
        }

        if stack.contains(key) {
            let mut cycle: Vec<String> = stack.iter().map(|k| format!("{:?}", k)).collect();
            cycle.push(format!("{:?}", key));
            return Err(EvalError::DependencyCycle(cycle));
        }

        self.states
            .borrow_mut()
            .insert(key.clone(), KeyState::InProgress);
        stack.push(key.clone());

        let result = loop {
            trace!(?key, "evaluating key");
            let env = Environment::new(self);
            let attempt = computation.compute(key, &env);
            let (recorded_deps, missing) = env.recorded_deps();
            self.deps.borrow_mut().insert(key.clone(), recorded_deps.clone());

            match attempt {
                Err(e) if !e.is_missing_dependency() => break Err(e),
                Err(_) | Ok(_) if missing => {
                    // Resolve every not-yet-settled recorded dependency,
                    // then retry. The first terminal failure among them
                    // is surfaced as this key's own failure.
                    let mut failed = None;
                    for dep in recorded_deps {
                        if dep == *key {
                            continue;
                        }
                        match self.state_of(&dep) {
                            Some(KeyState::Completed(_)) | Some(KeyState::Failed(_)) => {}
                            _ => match self.evaluate_key(&dep, computation, stack) {
                                Ok(_) => {}
                                Err(e) => {
                                    failed = Some(e);
                                    break;
                                }
                            },
                        }
                    }
                    if let Some(e) = failed {
                        break Err(e);
                    }
                    continue;
                }
                Ok(v) => break Ok(v),
                Err(e) => break Err(e),
            }
        };

        stack.pop();
        let state = match &result {
            Ok(v) => KeyState::Completed(v.clone()),
            Err(e) => KeyState::Failed(e.clone()),
        };
        self.states.borrow_mut().insert(key.clone(), state);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    enum K {
        A,
        B,
        C,
        SelfCycle,
    }

    struct Doubler;
    impl Computation<K, i64> for Doubler {
        fn compute(&self, key: &K, env: &Environment<'_, K, i64>) -> Result<i64, EvalError> {
            match key {
                K::A => Ok(1),
                K::B => {
                    let a = env.get(K::A).ok_or(EvalError::MissingDependency)?;
                    Ok(a * 2)
                }
                K::C => {
                    let a = env.get(K::A).ok_or(EvalError::MissingDependency)?;
                    let b = env.get(K::B).ok_or(EvalError::MissingDependency)?;
                    Ok(a + b)
                }
                K::SelfCycle => {
                    env.get(K::SelfCycle).ok_or(EvalError::MissingDependency)?;
                    Ok(0)
                }
            }
        }
    }

    #[test]
    fn resolves_transitive_dependencies() {
        let engine: Engine<K, i64> = Engine::new();
        let result = engine.evaluate(K::C, &Doubler).unwrap();
        assert_eq!(result, 3);
    }

    #[test]
    fn memoizes_completed_keys() {
        let engine: Engine<K, i64> = Engine::new();
        assert_eq!(engine.evaluate(K::B, &Doubler).unwrap(), 2);
        assert_eq!(engine.dependencies_of(&K::B).len(), 1);
        // Second evaluation of an already-completed key is served from
        // cache without revisiting the computation's dependency set.
        assert_eq!(engine.evaluate(K::B, &Doubler).unwrap(), 2);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let engine: Engine<K, i64> = Engine::new();
        let err = engine.evaluate(K::SelfCycle, &Doubler).unwrap_err();
        assert!(matches!(err, EvalError::DependencyCycle(_)));
    }
}
