//! Catalog of template functions.
//!
//! The registry is built once at startup and describes each function by
//! name, result shape and effect. Nothing is bound to a template until a
//! render asks for it: [`FunctionRegistry::bind`] instantiates every
//! function against a fresh [`RenderScope`], while
//! [`FunctionRegistry::bind_dry_run`] swaps recording functions for
//! same-shaped stubs and turns project references into recorded names.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use recast_common::error::RecastError;
use tera::{Tera, Value};

use crate::ledger::{Ledger, MaterialRecorder};
use crate::release::ReleaseMemo;

/// A function instance as registered with the template engine.
pub type TemplateFn = Box<dyn Fn(&HashMap<String, Value>) -> tera::Result<Value> + Send + Sync>;

type Factory = Arc<dyn Fn(&RenderScope) -> TemplateFn + Send + Sync>;

/// Boxes a closure as a [`TemplateFn`].
pub fn template_fn<F>(function: F) -> TemplateFn
where
    F: Fn(&HashMap<String, Value>) -> tera::Result<Value> + Send + Sync + 'static,
{
    Box::new(function)
}

/// Category of value a function returns; drives dry-run stub construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// A string (or number); stubbed as `""`.
    Scalar,
    /// A string-keyed object; stubbed as `{}`.
    Mapping,
    /// An array; stubbed as `[]`.
    Sequence,
}

impl ResultShape {
    /// The zero value of this shape.
    #[must_use]
    pub fn zero(self) -> Value {
        match self {
            Self::Scalar => Value::String(String::new()),
            Self::Mapping => Value::Object(tera::Map::new()),
            Self::Sequence => Value::Array(Vec::new()),
        }
    }
}

/// What calling a function does beyond returning a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// No side effects; runs for real even during dry runs.
    Pure,
    /// Resolves something externally and writes to the ledger.
    Recording,
    /// Like `Recording`, and the named argument references another project.
    Reference {
        /// Argument holding the referenced project name.
        arg: &'static str,
    },
}

/// One catalog entry.
#[derive(Clone)]
pub struct FunctionSpec {
    name: String,
    shape: ResultShape,
    effect: Effect,
    factory: Factory,
}

impl FunctionSpec {
    /// Function name as used in templates.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared result shape.
    #[must_use]
    pub const fn shape(&self) -> ResultShape {
        self.shape
    }

    /// Declared effect.
    #[must_use]
    pub const fn effect(&self) -> Effect {
        self.effect
    }
}

impl std::fmt::Debug for FunctionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionSpec")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("effect", &self.effect)
            .finish_non_exhaustive()
    }
}

/// State shared by every function bound for one render.
///
/// Holds the material recorder, the per-render release memos, and the
/// first resolver failure (so it can be reported as such rather than as a
/// generic template error).
#[derive(Debug, Clone, Default)]
pub struct RenderScope {
    recorder: MaterialRecorder,
    releases: Arc<Mutex<HashMap<String, Arc<ReleaseMemo>>>>,
    failure: Arc<Mutex<Option<RecastError>>>,
}

impl RenderScope {
    /// Creates a scope with an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one material in this render's ledger.
    pub fn record(&self, key: impl Into<String>, value: impl Into<String>) {
        self.recorder.record(key, value);
    }

    /// Returns the ledger as recorded so far.
    #[must_use]
    pub fn ledger(&self) -> Ledger {
        self.recorder.snapshot()
    }

    /// Returns the release memo for `family`, creating it on first use.
    #[must_use]
    pub fn release_memo(&self, family: &str) -> Arc<ReleaseMemo> {
        let mut releases = self.releases.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(releases.entry(family.to_string()).or_default())
    }

    /// Stores a resolver failure and converts it for the template engine.
    ///
    /// Only the first failure is kept; it is the one that aborted the render.
    pub fn fail(&self, error: RecastError) -> tera::Error {
        let message = error.to_string();
        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if failure.is_none() {
            *failure = Some(error);
        }
        tera::Error::msg(message)
    }

    /// Takes the stored resolver failure, if any.
    pub fn take_failure(&self) -> Option<RecastError> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Collects project names referenced during a dry run.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCollector {
    names: Arc<Mutex<Vec<String>>>,
}

impl ReferenceCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, name: String) {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name);
    }

    /// Returns the names in the order they were referenced.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Named template functions and how to instantiate them.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, FunctionSpec>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a function.
    ///
    /// `factory` is called once per bind with the render's scope and must
    /// return the callable the template engine will invoke.
    pub fn register<F>(&mut self, name: impl Into<String>, shape: ResultShape, effect: Effect, factory: F)
    where
        F: Fn(&RenderScope) -> TemplateFn + Send + Sync + 'static,
    {
        let name = name.into();
        let entry = FunctionSpec {
            name: name.clone(),
            shape,
            effect,
            factory: Arc::new(factory),
        };
        let _ = self.functions.insert(name, entry);
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.get(name)
    }

    /// Iterates over all functions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &FunctionSpec> {
        self.functions.values()
    }

    /// Number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Registers every function with `tera`, writing into `scope`.
    pub fn bind(&self, tera: &mut Tera, scope: &RenderScope) {
        for entry in self.functions.values() {
            register(tera, &entry.name, (entry.factory)(scope));
        }
    }

    /// Registers dry-run stand-ins with `tera`.
    ///
    /// Pure functions are bound for real against a throwaway scope.
    /// Recording functions return the zero value of their shape. Reference
    /// functions push their argument into `collector` and return `""`.
    pub fn bind_dry_run(&self, tera: &mut Tera, collector: &ReferenceCollector) {
        let scratch = RenderScope::new();
        for entry in self.functions.values() {
            let function: TemplateFn = match entry.effect {
                Effect::Pure => (entry.factory)(&scratch),
                Effect::Recording => {
                    let zero = entry.shape.zero();
                    template_fn(move |_| Ok(zero.clone()))
                }
                Effect::Reference { arg } => {
                    let collector = collector.clone();
                    let name = entry.name.clone();
                    template_fn(move |args| {
                        let reference = args.get(arg).and_then(Value::as_str).ok_or_else(|| {
                            tera::Error::msg(format!("{name}: missing string argument `{arg}`"))
                        })?;
                        collector.push(reference.to_string());
                        Ok(Value::String(String::new()))
                    })
                }
            };
            register(tera, &entry.name, function);
        }
    }
}

fn register(tera: &mut Tera, name: &str, function: TemplateFn) {
    tera.register_function(name, move |args: &HashMap<String, Value>| function(args));
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_registry(calls: &Arc<AtomicUsize>) -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();

        let counter = Arc::clone(calls);
        registry.register("lookup", ResultShape::Scalar, Effect::Recording, move |scope| {
            let counter = Arc::clone(&counter);
            let scope = scope.clone();
            template_fn(move |_| {
                let _ = counter.fetch_add(1, Ordering::SeqCst);
                scope.record("lookup:x", "1");
                Ok(Value::String("resolved".into()))
            })
        });

        let counter = Arc::clone(calls);
        registry.register("packages", ResultShape::Mapping, Effect::Recording, move |_| {
            let counter = Arc::clone(&counter);
            template_fn(move |_| {
                let _ = counter.fetch_add(1, Ordering::SeqCst);
                Ok(serde_json::json!({"curl": "1"}))
            })
        });

        registry.register("shout", ResultShape::Scalar, Effect::Pure, |_| {
            template_fn(|args| {
                let value = args.get("value").and_then(Value::as_str).unwrap_or_default();
                Ok(Value::String(value.to_uppercase()))
            })
        });

        registry.register(
            "image",
            ResultShape::Scalar,
            Effect::Reference { arg: "ref" },
            |_| template_fn(|_| Ok(Value::String("real".into()))),
        );

        registry
    }

    fn render(tera: &mut Tera, template: &str) -> tera::Result<String> {
        tera.add_raw_template("t", template)?;
        tera.render("t", &tera::Context::new())
    }

    #[test]
    fn bind_writes_into_scope_ledger() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(&calls);
        let scope = RenderScope::new();
        let mut tera = Tera::default();
        registry.bind(&mut tera, &scope);

        let out = render(&mut tera, "{{ lookup() }}").expect("render");
        assert_eq!(out, "resolved");
        assert_eq!(scope.ledger().get("lookup:x"), Some("1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dry_run_stubs_by_shape_and_collects_references() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(&calls);
        let collector = ReferenceCollector::new();
        let mut tera = Tera::default();
        registry.bind_dry_run(&mut tera, &collector);

        let out = render(
            &mut tera,
            "[{{ lookup() }}]{% for k, v in packages() %}{{ k }}{% endfor %}\
             {{ shout(value='a') }}{{ image(ref='base') }}{{ image(ref='golang') }}",
        )
        .expect("render");

        assert_eq!(out, "[]A");
        assert_eq!(collector.names(), vec!["base", "golang"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dry_run_reference_requires_argument() {
        let registry = counting_registry(&Arc::new(AtomicUsize::new(0)));
        let mut tera = Tera::default();
        registry.bind_dry_run(&mut tera, &ReferenceCollector::new());
        assert!(render(&mut tera, "{{ image() }}").is_err());
    }

    #[test]
    fn shapes_have_matching_zero_values() {
        assert_eq!(ResultShape::Scalar.zero(), Value::String(String::new()));
        assert!(ResultShape::Mapping.zero().as_object().is_some_and(tera::Map::is_empty));
        assert!(ResultShape::Sequence.zero().as_array().is_some_and(Vec::is_empty));
    }

    #[test]
    fn scope_keeps_first_failure() {
        let scope = RenderScope::new();
        let _ = scope.fail(RecastError::resolver("image:a", "first"));
        let _ = scope.fail(RecastError::resolver("image:b", "second"));
        let failure = scope.take_failure().expect("failure");
        assert!(failure.to_string().contains("first"));
        assert!(scope.take_failure().is_none());
    }

    #[test]
    fn registry_lists_functions_in_name_order() {
        let registry = counting_registry(&Arc::new(AtomicUsize::new(0)));
        let names: Vec<&str> = registry.iter().map(FunctionSpec::name).collect();
        assert_eq!(names, vec!["image", "lookup", "packages", "shout"]);
        assert_eq!(
            registry.get("image").map(FunctionSpec::effect),
            Some(Effect::Reference { arg: "ref" })
        );
    }
}
