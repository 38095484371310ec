//! The evaluation system.
//!
//! A [`System`] owns every registry and store for one interpreter instance:
//! the dimension translator, the type registry, the equation groups and the
//! demand cache. Evaluating a name at a context:
//! 1. Probes the cache; a hit returns at once, an in-progress entry yields
//!    `special<loop>`
//! 2. Marks the (name, context) pair in progress and selects an equation by
//!    best fit
//! 3. Evaluates the chosen body, tracking every dimension read
//! 4. Stores the value under the dimensions read, unless it depended on an
//!    enclosing cycle
//!
//! Edits take `&mut self`; evaluation takes `&self` and uses interior
//! mutability for the translator, cache, read tracker and statistics.
//! An edit drops the cached values of the edited name and of every name
//! whose cached values were computed through it.

use crate::bestfit::{self, Selection};
use crate::cache::{Lookup, Warehouse};
use crate::constant::{Constant, Special};
use crate::context::Context;
use crate::dimension::{DimensionIndex, DimensionKey, DimensionTranslator};
use crate::equation::{Definition, Equation, EquationGroup, EquationId};
use crate::error::{EngineError, EvalResult};
use crate::expr::{self, Expr};
use crate::hyperdaton::Hyperdaton;
use crate::region::Region;
use crate::types::{TypeIndex, TypeRegistry};
use crate::workshops::HyperdatonWs;
use crate::ws::Ws;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::{Cell, RefCell};
use std::fmt::Write as _;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Free native stack below which evaluation moves to a fresh segment.
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each stack segment allocated for deep recursion.
const STACK_SEGMENT: usize = 4 * 1024 * 1024;

/// Configuration for the system.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of nested name evaluations. This is a resource limit:
    /// the native stack grows on demand, so only recursion deeper than this
    /// is reported, as `EngineError::DepthExceeded`.
    pub max_depth: usize,
    /// Whether evaluated values are memoized.
    pub caching: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_depth: 100_000,
            caching: true,
        }
    }
}

/// Statistics about evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalStats {
    pub evaluations: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_stores: usize,
    pub loops: usize,
    pub invalidations: usize,
}

/// A set of operators or equations installed by the host.
pub trait Library {
    fn name(&self) -> &str;

    fn register(&self, sys: &mut System) -> EvalResult<()>;
}

/// Reads collected while evaluating one name or one `@` body.
#[derive(Debug, Default)]
struct Frame {
    owner: Option<(Rc<str>, Context)>,
    reads: FxHashSet<DimensionIndex>,
    /// The value depends on a cycle through an enclosing frame.
    tainted: bool,
}

/// The evaluation system.
pub struct System {
    config: EngineConfig,
    translator: RefCell<DimensionTranslator>,
    types: TypeRegistry,
    variables: FxHashMap<Rc<str>, EquationGroup>,
    owners: FxHashMap<EquationId, Rc<str>>,
    warehouse: RefCell<Warehouse>,
    /// Callee name to the names whose evaluation read it.
    dependents: RefCell<FxHashMap<Rc<str>, FxHashSet<Rc<str>>>>,
    frames: RefCell<Vec<Frame>>,
    depth: Cell<usize>,
    stats: RefCell<EvalStats>,
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

impl System {
    /// Create a system with no libraries loaded.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        System {
            config,
            translator: RefCell::new(DimensionTranslator::new()),
            types: TypeRegistry::new(),
            variables: FxHashMap::default(),
            owners: FxHashMap::default(),
            warehouse: RefCell::new(Warehouse::new()),
            dependents: RefCell::new(FxHashMap::default()),
            frames: RefCell::new(Vec::new()),
            depth: Cell::new(0),
            stats: RefCell::new(EvalStats::default()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> EvalStats {
        self.stats.borrow().clone()
    }

    pub fn reset_stats(&self) {
        *self.stats.borrow_mut() = EvalStats::default();
    }

    // Registries

    /// Intern a dimension name.
    pub fn dimension_index(&self, name: &str) -> EvalResult<DimensionIndex> {
        self.translator.borrow_mut().lookup(name)
    }

    /// Intern a typed constant as a dimension.
    pub fn constant_dimension_index(&self, value: &Constant) -> EvalResult<DimensionIndex> {
        self.translator.borrow_mut().lookup_constant(value)
    }

    /// Allocate an anonymous dimension.
    pub fn unique_dimension(&self) -> EvalResult<DimensionIndex> {
        self.translator.borrow_mut().unique()
    }

    /// The key a dimension was allocated for.
    pub fn dimension_key(&self, dim: DimensionIndex) -> EvalResult<DimensionKey> {
        self.translator
            .borrow()
            .resolve(dim)
            .cloned()
            .ok_or(EngineError::UnknownDimension(dim))
    }

    pub fn type_index(&self, name: &str) -> Option<TypeIndex> {
        self.types.type_index(name)
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    /// Render a context with dimension names, e.g. `[n:20, x:"a"]`.
    pub fn format_context(&self, context: &Context) -> EvalResult<String> {
        let mut out = String::from("[");
        for (i, (dim, value)) in context.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let key = self.dimension_key(*dim)?;
            let _ = write!(out, "{}:{}", key, value);
        }
        out.push(']');
        Ok(out)
    }

    /// Run a library's registration callback.
    pub fn load(&mut self, library: &dyn Library) -> EvalResult<()> {
        library.register(self).map_err(|err| {
            warn!(library = library.name(), error = %err, "library registration failed");
            match err {
                EngineError::Registration { .. } => err,
                other => EngineError::Registration {
                    library: library.name().to_string(),
                    reason: other.to_string(),
                },
            }
        })?;
        debug!(library = library.name(), "library registered");
        Ok(())
    }

    // Edits

    /// Add an equation for `name`.
    pub fn add_equation(
        &mut self,
        name: &str,
        id: EquationId,
        definition: Definition,
        time: u64,
    ) -> EvalResult<()> {
        if self.owners.contains_key(&id) {
            return Err(EngineError::DuplicateEquation(id));
        }

        let name: Rc<str> = match self.variables.get_key_value(name) {
            Some((existing, _)) => existing.clone(),
            None => Rc::from(name),
        };
        self.variables
            .entry(name.clone())
            .or_insert_with(|| EquationGroup::new(name.clone()))
            .add(id, definition, time)?;
        self.owners.insert(id, name.clone());

        debug!(name = %name, id = %id, time, "equation added");
        self.invalidate(&name);
        Ok(())
    }

    /// Compile `rhs` and add it as an equation for `name`.
    pub fn define(
        &mut self,
        name: &str,
        id: EquationId,
        guard: Region,
        rhs: &Expr,
        time: u64,
    ) -> EvalResult<()> {
        let rhs = expr::compile(rhs, self)?;
        self.add_equation(name, id, Definition::new(guard, rhs), time)
    }

    /// Delete an equation. Returns false if the id is unknown.
    pub fn del(&mut self, id: EquationId, time: u64) -> bool {
        let Some(name) = self.owners.remove(&id) else {
            return false;
        };
        if let Some(group) = self.variables.get_mut(&name) {
            group.remove(id);
            if group.is_empty() {
                self.variables.remove(&name);
            }
        }
        debug!(name = %name, id = %id, time, "equation deleted");
        self.invalidate(&name);
        true
    }

    /// Replace an equation's definition. Returns false if the id is unknown.
    pub fn repl(&mut self, id: EquationId, time: u64, definition: Definition) -> bool {
        let Some(name) = self.owners.get(&id).cloned() else {
            return false;
        };
        let replaced = self
            .variables
            .get_mut(&name)
            .map_or(false, |group| group.replace(id, definition, time));
        if replaced {
            debug!(name = %name, id = %id, time, "equation replaced");
            self.invalidate(&name);
        }
        replaced
    }

    /// Bind a hyperdaton under `name` as an always-applicable equation.
    pub fn add_hyperdaton(
        &mut self,
        name: &str,
        id: EquationId,
        source: Rc<dyn Hyperdaton>,
        time: u64,
    ) -> EvalResult<()> {
        let body = Rc::new(HyperdatonWs::new(source));
        self.add_equation(name, id, Definition::unguarded(body), time)
    }

    /// Drop every cached value of `name` and of the names that read it,
    /// transitively.
    fn invalidate(&mut self, name: &str) {
        let dependents = self.dependents.get_mut();
        let mut seen: FxHashSet<Rc<str>> = FxHashSet::default();
        let mut pending: Vec<Rc<str>> = vec![Rc::from(name)];

        while let Some(next) = pending.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            // Each caller is dropped in turn, so its edges are stale.
            if let Some(callers) = dependents.remove(&next) {
                pending.extend(callers);
            }
            if self.warehouse.get_mut().invalidate(&next) {
                self.stats.get_mut().invalidations += 1;
                debug!(name = %next, edited = name, "cache invalidated");
            }
        }
    }

    /// Drop every cached value.
    pub fn clear_cache(&mut self) {
        self.warehouse.get_mut().clear();
        self.dependents.get_mut().clear();
    }

    /// Equations of `name` in dispatch order.
    pub fn equations(&self, name: &str) -> Vec<Rc<Equation>> {
        self.variables
            .get(name)
            .map(|group| group.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Names that currently have equations.
    pub fn names(&self) -> impl Iterator<Item = &Rc<str>> {
        self.variables.keys()
    }

    /// Cached values held for `name`.
    pub fn cached_values(&self, name: &str) -> usize {
        self.warehouse.borrow().value_count(name)
    }

    // Evaluation

    /// Evaluate `name` at `context`.
    pub fn evaluate(&self, name: &str, context: &Context) -> EvalResult<Constant> {
        let name = match self.variables.get_key_value(name) {
            Some((existing, _)) => existing.clone(),
            None => return Ok(Constant::Special(Special::Undef)),
        };
        self.evaluate_name(&name, context)
    }

    /// Evaluate a compiled expression at `context`.
    pub fn evaluate_ws(&self, ws: &dyn Ws, context: &Context) -> EvalResult<Constant> {
        ws.eval(self, context)
    }

    /// Compile and evaluate an expression at `context`.
    pub fn evaluate_expr(&self, tree: &Expr, context: &Context) -> EvalResult<Constant> {
        let ws = expr::compile(tree, self)?;
        ws.eval(self, context)
    }

    /// Evaluate a name reached from inside another evaluation.
    pub(crate) fn evaluate_name(&self, name: &Rc<str>, context: &Context) -> EvalResult<Constant> {
        self.stats.borrow_mut().evaluations += 1;
        self.record_caller(name);

        let Some(group) = self.variables.get(name) else {
            return Ok(Constant::Special(Special::Undef));
        };

        if let Some(value) = self.probe(name, context) {
            return Ok(value);
        }

        let depth = self.depth.get();
        if depth >= self.config.max_depth {
            warn!(name = %name, limit = self.config.max_depth, "evaluation depth exceeded");
            return Err(EngineError::DepthExceeded {
                name: name.to_string(),
                limit: self.config.max_depth,
            });
        }

        self.warehouse.borrow_mut().mark_in_progress(name, context);
        self.frames.borrow_mut().push(Frame {
            owner: Some((name.clone(), context.clone())),
            ..Frame::default()
        });
        self.depth.set(depth + 1);

        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || {
            self.dispatch(name, group, context)
        });

        self.depth.set(depth);
        let frame = self.frames.borrow_mut().pop().unwrap_or_default();
        self.warehouse.borrow_mut().clear_in_progress(name, context);

        let value = result?;
        if self.config.caching && !frame.tainted {
            let variance: Vec<DimensionIndex> = frame.reads.iter().copied().collect();
            self.warehouse
                .borrow_mut()
                .set(name, context, &variance, value.clone())
                .inspect_err(|err| warn!(name = %name, error = %err, "cache store failed"))?;
            self.stats.borrow_mut().cache_stores += 1;
        }
        self.record_reads(frame.reads);
        Ok(value)
    }

    /// Check the cache and in-progress markers. `Some` short-circuits evaluation.
    fn probe(&self, name: &Rc<str>, context: &Context) -> Option<Constant> {
        let (lookup, path) = if self.config.caching {
            self.warehouse.borrow().probe(name, context)
        } else if self.warehouse.borrow().is_in_progress(name, context) {
            (Lookup::InProgress, Vec::new())
        } else {
            (Lookup::Miss, Vec::new())
        };

        match lookup {
            Lookup::Hit(value) => {
                trace!(name = %name, "cache hit");
                self.stats.borrow_mut().cache_hits += 1;
                self.record_reads(path);
                Some(value)
            }
            Lookup::InProgress => {
                debug!(name = %name, "cycle detected");
                self.stats.borrow_mut().loops += 1;
                self.taint_above(name, context);
                self.record_reads(context.dims());
                Some(Constant::Special(Special::Loop))
            }
            Lookup::Miss => {
                trace!(name = %name, "cache miss");
                self.stats.borrow_mut().cache_misses += 1;
                None
            }
        }
    }

    fn dispatch(&self, name: &Rc<str>, group: &EquationGroup, context: &Context) -> EvalResult<Constant> {
        match bestfit::select(self, group, context)? {
            Selection::Unique(equation) => {
                trace!(name = %name, id = %equation.id, "dispatch");
                equation.rhs.eval(self, context)
            }
            Selection::Undefined => Ok(Constant::Special(Special::Undef)),
            Selection::Ambiguous(ids) => {
                debug!(name = %name, candidates = ?ids, "ambiguous best fit");
                Ok(Constant::Special(Special::MultiDef))
            }
        }
    }

    /// Remember that the innermost name under evaluation reads `callee`.
    fn record_caller(&self, callee: &Rc<str>) {
        let caller = self
            .frames
            .borrow()
            .iter()
            .rev()
            .find_map(|f| f.owner.as_ref().map(|(n, _)| n.clone()));
        if let Some(caller) = caller.filter(|c| c != callee) {
            self.dependents
                .borrow_mut()
                .entry(callee.clone())
                .or_default()
                .insert(caller);
        }
    }

    /// Mark every frame above the one evaluating (name, context) as tainted.
    fn taint_above(&self, name: &Rc<str>, context: &Context) {
        let mut frames = self.frames.borrow_mut();
        let start = frames
            .iter()
            .rposition(|f| {
                f.owner
                    .as_ref()
                    .map_or(false, |(n, k)| n == name && k == context)
            })
            .map_or(0, |i| i + 1);
        for frame in &mut frames[start..] {
            frame.tainted = true;
        }
    }

    // Read tracking

    /// Record that the current evaluation read `dim`.
    pub fn record_read(&self, dim: DimensionIndex) {
        if let Some(frame) = self.frames.borrow_mut().last_mut() {
            frame.reads.insert(dim);
        }
    }

    pub fn record_reads(&self, dims: impl IntoIterator<Item = DimensionIndex>) {
        if let Some(frame) = self.frames.borrow_mut().last_mut() {
            frame.reads.extend(dims);
        }
    }

    /// Run `f` in a fresh read frame and return what it read.
    pub fn scoped<T>(&self, f: impl FnOnce() -> T) -> (T, FxHashSet<DimensionIndex>) {
        self.frames.borrow_mut().push(Frame::default());
        let result = f();
        let frame = self.frames.borrow_mut().pop().unwrap_or_default();
        (result, frame.reads)
    }
}

/// Builder for constructing a system.
pub struct SystemBuilder {
    config: EngineConfig,
    libraries: Vec<Box<dyn Library>>,
}

impl Default for SystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBuilder {
    pub fn new() -> Self {
        SystemBuilder {
            config: EngineConfig::default(),
            libraries: Vec::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_depth(mut self, n: usize) -> Self {
        self.config.max_depth = n;
        self
    }

    pub fn caching(mut self, enabled: bool) -> Self {
        self.config.caching = enabled;
        self
    }

    pub fn library(mut self, library: impl Library + 'static) -> Self {
        self.libraries.push(Box::new(library));
        self
    }

    pub fn build(self) -> EvalResult<System> {
        let mut sys = System::with_config(self.config);
        for library in &self.libraries {
            sys.load(library.as_ref())?;
        }
        Ok(sys)
    }
}
