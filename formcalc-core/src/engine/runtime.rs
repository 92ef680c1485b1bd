//! Recalculation Engine
//!
//! The engine connects one form container with its calculations. It keeps the
//! value store current and re-runs calculations whenever something they read
//! changes.
//!
//! # How It Works
//!
//! 1. On construction the calculations are loaded into a dependency graph
//!    and checked for cycles.
//!
//! 2. Every managed field in the container is read through the input hook
//!    into the value store.
//!
//! 3. Every stored field is treated as freshly changed once, which seeds all
//!    calculated fields and variables.
//!
//! 4. On each [`Engine::update`] the changed field is re-read and the cascade
//!    runs from it:
//!    a. Find the calculations that read the trigger, in registration order
//!    b. Run each one and coerce its result to a number
//!    c. Not a number: stop this branch, nothing is stored
//!    d. Otherwise store the number, write fields back into their element,
//!       and cascade again from the output
//!
//! Cascades are synchronous and depth-first. A cascade always finishes
//! before `update` returns.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{debug, debug_span, info, trace, warn};

use super::calculation::{Calculation, Target};
use super::context::EngineContext;
use super::store::ValueStore;
use crate::config::{EngineConfig, EngineSettings, FormatInput, FormatOutput};
use crate::error::ConfigError;
use crate::graph::DependencyGraph;
use crate::host::{ChangeEvent, Container, FieldHandle};
use crate::value::Value;

/// Unique identifier for an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineId(u64);

impl EngineId {
    /// Generate a new unique engine ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EngineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine-{}", self.0)
    }
}

/// Registry positions of the calculations that read one target.
type Dependents = SmallVec<[usize; 4]>;

/// The recalculation engine for one form container.
pub struct Engine {
    id: EngineId,
    container: Arc<dyn Container>,
    store: ValueStore,

    /// Calculations in registration order.
    calculations: Vec<Calculation>,

    /// Trigger to the calculations reading it, in registration order.
    dependents: HashMap<Target, Dependents>,

    graph: DependencyGraph,
    format_input: FormatInput,
    format_output: FormatOutput,
    settings: EngineSettings,
}

impl Engine {
    /// Build an engine for `container` and run the initial calculation pass.
    ///
    /// Fails when the calculations form a cycle and the settings do not
    /// allow cycles.
    pub fn new(container: Arc<dyn Container>, config: EngineConfig) -> Result<Self, ConfigError> {
        let EngineConfig {
            calculations,
            format_input,
            format_output,
            settings,
        } = config;

        let id = EngineId::new();
        let _span = debug_span!("engine_init", engine = %id).entered();

        let graph = build_graph(&calculations, &settings)?;
        let dependents = index_dependents(&calculations);

        let mut engine = Self {
            id,
            container,
            store: ValueStore::new(),
            calculations,
            dependents,
            graph,
            format_input,
            format_output,
            settings,
        };

        engine.load_fields();
        engine.recalculate();

        info!(
            engine = %engine.id,
            fields = engine.store.field_count(),
            variables = engine.store.variable_count(),
            calculations = engine.calculations.len(),
            "form engine ready"
        );
        Ok(engine)
    }

    /// Read every managed field of the container into the store.
    fn load_fields(&mut self) {
        for element in self.container.managed_fields() {
            let value = (self.format_input)(&element.value(), &*element);
            self.store.set_field(element.name(), value);
        }
    }

    /// Get the engine's unique ID.
    pub fn id(&self) -> EngineId {
        self.id
    }

    /// The container this engine manages.
    pub fn container(&self) -> &Arc<dyn Container> {
        &self.container
    }

    /// The settings this engine was built with.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Handle a change of `element`.
    ///
    /// Elements outside the container or not part of the managed form are
    /// ignored and `false` is returned. Otherwise the element's value is
    /// stored and every dependent calculation re-runs.
    pub fn update(&mut self, element: &dyn FieldHandle) -> bool {
        if !self.container.contains(element) || !self.container.is_managed(element) {
            trace!(
                engine = %self.id,
                element = %element.id(),
                "ignoring change outside the managed form"
            );
            return false;
        }

        let value = (self.format_input)(&element.value(), element);
        debug!(engine = %self.id, field = element.name(), value = %value, "field changed");
        self.store.set_field(element.name(), value);

        let _span = debug_span!("cascade", engine = %self.id, field = element.name()).entered();
        self.run_dependents(&Target::field(element.name()), 0);
        true
    }

    /// Handle a change notification from the host.
    pub fn process_change(&mut self, event: &ChangeEvent) -> bool {
        self.update(&*event.target)
    }

    /// Re-run the calculations of every stored field.
    ///
    /// Fields are visited in store order. The current store is used as is;
    /// element values are not re-read.
    pub fn recalculate(&mut self) {
        let _span = debug_span!("recalculate", engine = %self.id).entered();
        for name in self.store.field_names() {
            self.run_dependents(&Target::Field(name), 0);
        }
    }

    /// Run every calculation that reads `trigger`, then cascade from each
    /// output.
    fn run_dependents(&mut self, trigger: &Target, depth: usize) {
        let Some(indices) = self.dependents.get(trigger).cloned() else {
            return;
        };

        if self.settings.allow_cycles && depth >= self.settings.max_cascade_depth {
            warn!(
                engine = %self.id,
                trigger = %trigger,
                depth,
                "cascade depth limit reached, stopping branch"
            );
            return;
        }

        for index in indices {
            let calculation = &self.calculations[index];
            let result = calculation.evaluate(&EngineContext::new(&self.store));

            let Some(number) = result.to_number() else {
                trace!(
                    engine = %self.id,
                    calculation = %calculation.name(),
                    result = ?result,
                    "result is not a number, branch stopped"
                );
                continue;
            };

            let output = calculation.output().clone();
            self.store_output(&output, number);
            self.run_dependents(&output, depth + 1);
        }
    }

    fn store_output(&mut self, output: &Target, number: f64) {
        let value = Value::Number(number);
        debug!(engine = %self.id, output = %output, value = number, "calculated");

        if let Target::Field(name) = output {
            match self.container.field_named(name) {
                Some(element) => {
                    let text = (self.format_output)(&value, &*element);
                    element.set_value(&text);
                }
                None => warn!(
                    engine = %self.id,
                    field = %name,
                    "no element to write the calculated value into"
                ),
            }
        }
        self.store.set(output, value);
    }

    /// Current value of a field or variable.
    pub fn value(&self, target: &Target) -> Option<&Value> {
        self.store.get(target)
    }

    /// Current value of the field `name`.
    pub fn field_value(&self, name: &str) -> Option<&Value> {
        self.store.field(name)
    }

    /// Current value of the variable `name`.
    pub fn variable_value(&self, name: &str) -> Option<&Value> {
        self.store.variable(name)
    }

    /// All stored fields, in store order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.store.fields()
    }

    /// All stored variables, in store order.
    pub fn variables(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.store.variables()
    }

    /// The live value store.
    pub fn store(&self) -> &ValueStore {
        &self.store
    }

    /// A copy of the current store.
    pub fn snapshot(&self) -> ValueStore {
        self.store.clone()
    }

    /// Targets a change of `trigger` can reach, dependencies first.
    pub fn affected_by(&self, trigger: &Target) -> Vec<Target> {
        self.graph.downstream(trigger)
    }

    /// Calculated targets in dependency order, or `None` for cyclic
    /// configurations.
    pub fn evaluation_order(&self) -> Option<Vec<Target>> {
        let order = self.graph.topological_order().ok()?;
        let derived: Vec<&Target> = self.graph.derived().collect();
        Some(
            order
                .into_iter()
                .filter(|target| derived.contains(&target))
                .collect(),
        )
    }

    /// Registered calculations, in registration order.
    pub fn calculations(&self) -> &[Calculation] {
        &self.calculations
    }

    /// Number of registered calculations.
    pub fn calculation_count(&self) -> usize {
        self.calculations.len()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.id)
            .field("store", &self.store)
            .field("calculations", &self.calculations.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Load calculations into a graph and reject cycles unless allowed.
fn build_graph(
    calculations: &[Calculation],
    settings: &EngineSettings,
) -> Result<DependencyGraph, ConfigError> {
    let mut graph = DependencyGraph::new();

    for calculation in calculations {
        let output = calculation.output();
        if !settings.allow_cycles && calculation.depends_on(output) {
            return Err(ConfigError::SelfDependency {
                name: calculation.name(),
                target: output.clone(),
            });
        }
        let inputs: Vec<Target> = calculation.inputs().collect();
        graph.add_calculation(&inputs, output);
    }

    if let Err(path) = graph.topological_order() {
        if !settings.allow_cycles {
            return Err(ConfigError::Cycle { path });
        }
        let cycle = path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ");
        warn!(
            %cycle,
            max_depth = settings.max_cascade_depth,
            "accepting cyclic calculations"
        );
    }

    Ok(graph)
}

fn index_dependents(calculations: &[Calculation]) -> HashMap<Target, Dependents> {
    let mut index: HashMap<Target, Dependents> = HashMap::new();
    for (position, calculation) in calculations.iter().enumerate() {
        for input in calculation.inputs() {
            let entry = index.entry(input).or_default();
            // An input listed twice must not run the calculation twice.
            if entry.last() != Some(&position) {
                entry.push(position);
            }
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::{MemoryContainer, MemoryField};
    use std::sync::atomic::AtomicUsize;

    fn sum_form() -> (Arc<MemoryContainer>, EngineConfig) {
        let form = MemoryContainer::new();
        form.add_field("a", "1");
        form.add_field("b", "2");
        form.add_field("x", "");
        form.add_field("y", "");

        let config = EngineConfig::new()
            .with_calculation(
                Calculation::to_field("x", |ctx| ctx.add(ctx.field("a"), ctx.field("b")))
                    .reads_fields(["a", "b"]),
            )
            .with_calculation(
                Calculation::to_field("y", |ctx| ctx.multiply(ctx.field("x"), 10.0)).reads_field("x"),
            );
        (form, config)
    }

    #[test]
    fn engine_ids_are_unique() {
        assert_ne!(EngineId::new(), EngineId::new());
    }

    #[test]
    fn construction_seeds_calculated_fields() {
        let (form, config) = sum_form();
        let engine = Engine::new(form.clone(), config).unwrap();

        assert_eq!(engine.field_value("x"), Some(&Value::Number(3.0)));
        assert_eq!(engine.field_value("y"), Some(&Value::Number(30.0)));
        assert_eq!(form.value_of("x").as_deref(), Some("3"));
        assert_eq!(form.value_of("y").as_deref(), Some("30"));
    }

    #[test]
    fn update_cascades_through_chain() {
        let (form, config) = sum_form();
        let mut engine = Engine::new(form.clone(), config).unwrap();

        let a = form.field("a").unwrap();
        a.input("0.1");
        assert!(engine.update(&*a));
        form.field("b").unwrap().input("0.2");
        assert!(engine.update(&*form.field("b").unwrap()));

        assert_eq!(engine.field_value("x"), Some(&Value::Number(0.3)));
        assert_eq!(engine.field_value("y"), Some(&Value::Number(3.0)));
        assert_eq!(form.value_of("x").as_deref(), Some("0.3"));
    }

    #[test]
    fn non_numeric_result_stops_branch() {
        let (form, config) = sum_form();
        let mut engine = Engine::new(form.clone(), config).unwrap();

        let a = form.field("a").unwrap();
        a.input("");
        engine.update(&*a);

        // The previous results stay in place.
        assert_eq!(engine.field_value("a"), Some(&Value::from("")));
        assert_eq!(engine.field_value("x"), Some(&Value::Number(3.0)));
        assert_eq!(engine.field_value("y"), Some(&Value::Number(30.0)));
        assert_eq!(form.value_of("x").as_deref(), Some("3"));
    }

    #[test]
    fn foreign_elements_are_ignored() {
        let (form, config) = sum_form();
        let mut engine = Engine::new(form.clone(), config).unwrap();
        let before = engine.snapshot();

        let outside = MemoryField::detached("a", "100");
        assert!(!engine.update(&*outside));

        let note = form.add_unmanaged_field("a", "100");
        assert!(!engine.update(&*note));

        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn variables_feed_fields() {
        let form = MemoryContainer::new();
        form.add_field("net", "100");
        form.add_field("gross", "");

        let config = EngineConfig::new()
            .with_calculation(
                Calculation::to_variable("vat", |ctx| ctx.multiply(ctx.field("net"), 0.19))
                    .reads_field("net"),
            )
            .with_calculation(
                Calculation::to_field("gross", |ctx| ctx.add(ctx.field("net"), ctx.variable("vat")))
                    .reads_variable("vat"),
            );

        let engine = Engine::new(form.clone(), config).unwrap();
        assert_eq!(engine.variable_value("vat"), Some(&Value::Number(19.0)));
        assert_eq!(form.value_of("gross").as_deref(), Some("119"));
    }

    #[test]
    fn siblings_run_in_registration_order() {
        let form = MemoryContainer::new();
        form.add_field("a", "1");

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let first = Arc::clone(&seen);
        let second = Arc::clone(&seen);
        let config = EngineConfig::new()
            .with_calculation(
                Calculation::to_variable("second", move |_| {
                    second.lock().push("second");
                    1.0
                })
                .reads_field("a"),
            )
            .with_calculation(
                Calculation::to_variable("first", move |_| {
                    first.lock().push("first");
                    1.0
                })
                .reads_field("a"),
            );

        Engine::new(form, config).unwrap();
        assert_eq!(*seen.lock(), vec!["second", "first"]);
    }

    #[test]
    fn duplicate_inputs_run_once() {
        let form = MemoryContainer::new();
        form.add_field("a", "1");

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let config = EngineConfig::new().with_calculation(
            Calculation::to_variable("v", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                1.0
            })
            .reads_fields(["a", "a"]),
        );

        Engine::new(form, config).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejects_cycles_by_default() {
        let form = MemoryContainer::new();
        form.add_field("a", "1");
        let config = EngineConfig::new()
            .with_calculation(Calculation::to_variable("b", |ctx| ctx.field("a")).reads_field("a"))
            .with_calculation(Calculation::to_field("a", |ctx| ctx.variable("b")).reads_variable("b"));

        let err = Engine::new(form, config).unwrap_err();
        assert!(matches!(err, ConfigError::Cycle { .. }));
    }

    #[test]
    fn rejects_self_dependency_by_default() {
        let form = MemoryContainer::new();
        let config = EngineConfig::new().with_calculation(
            Calculation::to_field("a", |ctx| ctx.field("a"))
                .reads_field("a")
                .named("echo"),
        );

        let err = Engine::new(form, config).unwrap_err();
        assert_eq!(err.to_string(), "calculation echo reads its own output field:a");
    }

    #[test]
    fn allowed_cycles_stop_at_depth_limit() {
        let form = MemoryContainer::new();
        form.add_field("a", "0");

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let config = EngineConfig::new()
            .with_calculation(
                Calculation::to_field("a", move |ctx| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ctx.add(ctx.field("a"), 1.0)
                })
                .reads_field("a"),
            )
            .with_settings(EngineSettings {
                allow_cycles: true,
                max_cascade_depth: 10,
            });

        let engine = Engine::new(form, config).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 10);
        assert_eq!(engine.field_value("a"), Some(&Value::Number(10.0)));
        assert!(engine.evaluation_order().is_none());
    }

    #[test]
    fn missing_output_element_still_updates_store() {
        let form = MemoryContainer::new();
        form.add_field("a", "4");
        let config = EngineConfig::new().with_calculation(
            Calculation::to_field("hidden", |ctx| ctx.multiply(ctx.field("a"), 2.0)).reads_field("a"),
        );

        let engine = Engine::new(form, config).unwrap();
        assert_eq!(engine.field_value("hidden"), Some(&Value::Number(8.0)));
    }

    #[test]
    fn hooks_format_in_and_out() {
        let form = MemoryContainer::new();
        form.add_field("price", "1.234,50");
        form.add_field("double", "");

        let config = EngineConfig::new()
            .with_format_input(|raw, _| Value::Text(raw.replace('.', "").replace(',', ".")))
            .with_format_output(|value, element| match element.name() {
                "double" => format!("{:.2}", value.as_f64()),
                _ => value.to_string(),
            })
            .with_calculation(
                Calculation::to_field("double", |ctx| ctx.multiply(ctx.field("price"), 2.0))
                    .reads_field("price"),
            );

        let engine = Engine::new(form.clone(), config).unwrap();
        assert_eq!(engine.field_value("price"), Some(&Value::from("1234.50")));
        assert_eq!(engine.field_value("double"), Some(&Value::Number(2469.0)));
        assert_eq!(form.value_of("double").as_deref(), Some("2469.00"));
    }

    #[test]
    fn introspection_reports_graph_order() {
        let (form, config) = sum_form();
        let engine = Engine::new(form, config).unwrap();

        assert_eq!(
            engine.affected_by(&Target::field("a")),
            vec![Target::field("x"), Target::field("y")]
        );
        assert_eq!(
            engine.evaluation_order(),
            Some(vec![Target::field("x"), Target::field("y")])
        );
        assert_eq!(engine.calculation_count(), 2);

        assert_eq!(engine.value(&Target::field("y")), Some(&Value::Number(30.0)));
        assert_eq!(engine.value(&Target::variable("y")), None);

        let names: Vec<&str> = engine.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b", "x", "y"]);
        assert_eq!(engine.variables().count(), 0);
    }
}
