mod builtin;

use std::{any::Any, collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{graph::Graph, leds::LedBuffer, LedGraphError, Result};

pub use builtin::{RainbowPattern, SolidPattern, SweepPattern, WalkersPattern};

/// Failure reported by pattern logic.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("invalid parameters: {0}")]
    Params(#[from] serde_json::Error),
    #[error("state holds a value of another type")]
    StateType,
    #[error("{0}")]
    Failed(String),
}

impl PatternError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

pub type PatternResult<T> = std::result::Result<T, PatternError>;

/// Logic invoked once per frame to paint the LED buffer. Anything it needs
/// to remember between frames goes into the [`StateBox`] it is handed.
pub trait Pattern: Send {
    fn name(&self) -> &str;

    /// Renders `frame`. Writes made before an error are kept.
    fn tick(
        &self,
        leds: &mut LedBuffer,
        frame: u64,
        graph: &Graph,
        state: &mut StateBox,
    ) -> PatternResult<()>;
}

impl fmt::Debug for dyn Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.name()).finish()
    }
}

type Slot = Option<Box<dyn Any + Send>>;

/// Type-erased memory owned by the active pattern.
///
/// Values written with [`replace`](Self::replace) or first inserted by
/// [`get_or_insert_with`](Self::get_or_insert_with) are staged: readers see
/// them at once, but they only become the kept state once the tick that wrote
/// them is committed. Mutation through `get_mut` or removal through `take`
/// applies to whatever is visible and is not undone.
#[derive(Default)]
pub struct StateBox {
    current: Slot,
    staged: Option<Slot>,
}

impl StateBox {
    pub fn new() -> Self {
        Self::default()
    }

    fn visible(&self) -> Option<&(dyn Any + Send + 'static)> {
        match &self.staged {
            Some(slot) => slot.as_deref(),
            None => self.current.as_deref(),
        }
    }

    fn visible_mut(&mut self) -> &mut Slot {
        match &mut self.staged {
            Some(slot) => slot,
            None => &mut self.current,
        }
    }

    pub fn is_absent(&self) -> bool {
        self.visible().is_none()
    }

    /// Drops both the kept and the staged value.
    pub fn clear(&mut self) {
        self.current = None;
        self.staged = None;
    }

    pub fn replace<T: Any + Send>(&mut self, value: T) {
        let boxed: Box<dyn Any + Send> = Box::new(value);
        self.staged = Some(Some(boxed));
    }

    pub fn get<T: Any + Send>(&self) -> Option<&T> {
        self.visible()?.downcast_ref()
    }

    pub fn get_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.visible_mut().as_mut()?.downcast_mut()
    }

    /// Removes and returns the visible value if it has type `T`.
    pub fn take<T: Any + Send>(&mut self) -> Option<T> {
        let slot = self.visible_mut();
        let boxed = slot.take()?;
        match boxed.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                *slot = Some(other);
                None
            }
        }
    }

    /// Returns the stored `T`, staging `init()` when the box is empty. Fails
    /// if the box holds some other type.
    pub fn get_or_insert_with<T, F>(&mut self, init: F) -> PatternResult<&mut T>
    where
        T: Any + Send,
        F: FnOnce() -> T,
    {
        if self.is_absent() {
            let boxed: Box<dyn Any + Send> = Box::new(init());
            self.staged = Some(Some(boxed));
        }
        self.visible_mut()
            .as_mut()
            .and_then(|slot| slot.downcast_mut())
            .ok_or(PatternError::StateType)
    }

    /// Keeps whatever was staged since the last commit.
    pub fn commit(&mut self) {
        if let Some(slot) = self.staged.take() {
            self.current = slot;
        }
    }

    /// Throws away whatever was staged since the last commit.
    pub fn rollback(&mut self) {
        self.staged = None;
    }
}

impl fmt::Debug for StateBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateBox")
            .field("absent", &self.is_absent())
            .finish()
    }
}

/// Name of a registered pattern plus its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSource {
    pub name: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl PatternSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: serde_json::Value::Null,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}

impl Default for PatternSource {
    fn default() -> Self {
        Self::new(WalkersPattern::NAME)
    }
}

type PatternFactory =
    Box<dyn Fn(&serde_json::Value) -> PatternResult<Box<dyn Pattern>> + Send + Sync>;

/// Name → factory table used to turn a [`PatternSource`] into live logic.
pub struct PatternRegistry {
    factories: BTreeMap<String, PatternFactory>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry preloaded with the bundled patterns.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(SolidPattern::NAME, |params| {
            Ok(Box::new(SolidPattern::from_params(params)?))
        });
        registry.register(RainbowPattern::NAME, |params| {
            Ok(Box::new(RainbowPattern::from_params(params)?))
        });
        registry.register(SweepPattern::NAME, |params| {
            Ok(Box::new(SweepPattern::from_params(params)?))
        });
        registry.register(WalkersPattern::NAME, |params| {
            Ok(Box::new(WalkersPattern::from_params(params)?))
        });
        registry
    }

    /// Adds or replaces the factory for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Value) -> PatternResult<Box<dyn Pattern>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Source for the pattern at `index` in name order, wrapping around.
    /// Lets an index selector (a knob, a button) cycle through patterns.
    pub fn source_at(&self, index: usize) -> Option<PatternSource> {
        if self.factories.is_empty() {
            return None;
        }
        self.names()
            .nth(index % self.factories.len())
            .map(PatternSource::new)
    }

    pub fn compile(&self, source: &PatternSource) -> Result<Box<dyn Pattern>> {
        let factory =
            self.factories
                .get(&source.name)
                .ok_or_else(|| LedGraphError::PatternCompile {
                    name: source.name.clone(),
                    reason: "no pattern registered under this name".to_string(),
                })?;
        factory(&source.params).map_err(|err| LedGraphError::PatternCompile {
            name: source.name.clone(),
            reason: err.to_string(),
        })
    }
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for PatternRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

/// Deserializes pattern parameters, treating `null` as "all defaults".
pub(crate) fn parse_params<T>(params: &serde_json::Value) -> PatternResult<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if params.is_null() {
        Ok(T::default())
    } else {
        Ok(serde_json::from_value(params.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn state_box_round_trips_values() {
        let mut state = StateBox::new();
        assert!(state.is_absent());

        *state.get_or_insert_with(|| 1u32).unwrap() += 1;
        assert_eq!(state.get::<u32>(), Some(&2));
        assert!(state.get::<String>().is_none());
        assert!(matches!(
            state.get_or_insert_with(String::new),
            Err(PatternError::StateType)
        ));

        assert_eq!(state.take::<String>(), None);
        assert_eq!(state.take::<u32>(), Some(2));
        assert!(state.is_absent());

        state.replace(vec![1, 2, 3]);
        state.get_mut::<Vec<i32>>().unwrap().push(4);
        assert_eq!(state.get::<Vec<i32>>().unwrap().len(), 4);
        state.clear();
        assert!(state.is_absent());
    }

    #[test]
    fn staged_values_are_kept_only_on_commit() {
        let mut state = StateBox::new();
        state.replace(1u32);
        assert_eq!(state.get::<u32>(), Some(&1));
        state.commit();

        state.replace(2u32);
        assert_eq!(state.get::<u32>(), Some(&2));
        state.rollback();
        assert_eq!(state.get::<u32>(), Some(&1));

        state.clear();
        state.get_or_insert_with(|| 5u32).unwrap();
        state.rollback();
        assert!(state.is_absent());

        *state.get_or_insert_with(|| 5u32).unwrap() += 1;
        state.commit();
        state.rollback();
        assert_eq!(state.get::<u32>(), Some(&6));
    }

    #[test]
    fn compiles_builtins_by_name() {
        let registry = PatternRegistry::with_builtins();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["rainbow", "solid", "sweep", "walkers"]);

        let solid = registry
            .compile(&PatternSource::new("solid").with_params(json!({ "color": [1, 2, 3] })))
            .unwrap();
        assert_eq!(solid.name(), "solid");
    }

    #[test]
    fn unknown_name_and_bad_params_fail_to_compile() {
        let registry = PatternRegistry::with_builtins();

        let err = registry.compile(&PatternSource::new("plasma")).unwrap_err();
        assert!(matches!(err, LedGraphError::PatternCompile { .. }));

        let err = registry
            .compile(&PatternSource::new("walkers").with_params(json!({ "count": "many" })))
            .unwrap_err();
        assert!(err.is_pattern_error());
        assert!(err.to_string().contains("walkers"));
    }

    #[test]
    fn index_selection_wraps() {
        let registry = PatternRegistry::with_builtins();
        assert_eq!(registry.source_at(0).unwrap().name, "rainbow");
        assert_eq!(registry.source_at(5).unwrap().name, "solid");
        assert!(PatternRegistry::new().source_at(0).is_none());
    }
}
