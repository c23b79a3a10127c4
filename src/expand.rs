//! Variable expansion engine for `{name}` placeholders in configuration strings.
//!
//! Configuration values may reference other variables declared in the
//! `library_path` section, e.g. `models: "{base_path_library}\models"`. The
//! [`Expander`] resolves such strings into concrete paths by walking the
//! variable reference graph with:
//!
//! - cycle detection (an ordered in-progress stack names the full cycle path)
//! - a depth cap as a backstop distinct from true cycle detection
//! - a memoized cache keyed by raw string and application scope
//! - a step-by-step [`TraceEntry`] record for diagnostics
//!
//! Application-scoped overrides (`Package`, `Installer`) shadow same-named
//! global variables for one application only; the cache key carries the scope
//! so one application's results never leak into another's.

use indexmap::IndexMap;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::models::ApplicationConfig;

/// Backstop for runaway resolution chains. True cycles are caught by the
/// in-progress stack before this limit is reached.
pub const MAX_RESOLUTION_DEPTH: usize = 32;

/// Override names injected per application; these are declared implicitly and
/// never count as missing in usage analysis.
pub const BUILTIN_OVERRIDES: [&str; 2] = ["Package", "Installer"];

/// Errors that can occur during variable expansion
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpandError {
    #[error("unresolved variable '{name}' (defined: {})", available.join(", "))]
    UnresolvedVariable { name: String, available: Vec<String> },

    #[error("circular variable reference: {}", cycle.join(" -> "))]
    CircularReference { cycle: Vec<String> },

    #[error("variable resolution exceeded depth limit of {limit}")]
    DepthLimitExceeded { limit: usize },
}

/// Raw (unexpanded) name to value definitions, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableTable {
    vars: IndexMap<String, String>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, raw_value: impl Into<String>) {
        self.vars.insert(name.into(), raw_value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl FromIterator<(String, String)> for VariableTable {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

/// Expansion context for one application (or the global context).
///
/// Overrides take precedence over same-named entries in the global table and
/// are scoped to this context only.
#[derive(Debug, Clone, Default)]
pub struct ExpansionScope {
    app: Option<String>,
    overrides: IndexMap<String, String>,
}

impl ExpansionScope {
    /// Context with no overrides, used for library-level strings.
    pub fn global() -> Self {
        Self::default()
    }

    /// Context for one application, injecting its `Package` and `Installer`
    /// values as scoped variables.
    pub fn for_application(app_name: &str, package: &str, installer: &str) -> Self {
        let mut overrides = IndexMap::new();
        overrides.insert("Package".to_string(), package.to_string());
        overrides.insert("Installer".to_string(), installer.to_string());
        Self {
            app: Some(app_name.to_string()),
            overrides,
        }
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.overrides.get(name).map(String::as_str)
    }

    fn cache_key(&self) -> Option<&str> {
        self.app.as_deref()
    }
}

/// One step of an expansion trace: a single substitution round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub step: usize,
    pub input: String,
    pub output: String,
    pub variables_used: Vec<String>,
}

/// Result of [`Expander::analyze_variable_usage`].
#[derive(Debug, Clone, Default)]
pub struct VariableUsage {
    /// Declared variables referenced by at least one application path
    /// (directly or through another referenced variable).
    pub used: Vec<String>,
    /// Declared but never referenced.
    pub unused: Vec<String>,
    /// Referenced but never declared.
    pub missing: Vec<String>,
    /// Reference counts per variable.
    pub usage_count: IndexMap<String, usize>,
    /// `section.kind.side` locations per variable.
    pub usage_locations: IndexMap<String, Vec<String>>,
}

/// Cache statistics, mainly for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

type CacheKey = (Option<String>, String);

/// Resolves `{name}` placeholders against a [`VariableTable`] plus
/// per-application overrides.
///
/// Expansion is memoized: a repeated call with an identical raw string, scope
/// and table returns the cached result without re-walking the reference graph
/// (observable via [`Expander::last_walk_steps`] dropping to zero).
#[derive(Debug)]
pub struct Expander {
    table: VariableTable,
    placeholder: Regex,
    cache: HashMap<CacheKey, String>,
    hits: u64,
    misses: u64,
    last_walk_steps: u64,
}

impl Expander {
    pub fn new(table: VariableTable) -> Self {
        Self {
            table,
            placeholder: Regex::new(r"\{([^{}]*)\}").expect("invalid placeholder regex"),
            cache: HashMap::new(),
            hits: 0,
            misses: 0,
            last_walk_steps: 0,
        }
    }

    pub fn table(&self) -> &VariableTable {
        &self.table
    }

    /// Expand `raw` into a fully substituted string.
    ///
    /// An empty string expands to itself and a string without placeholders is
    /// returned unchanged; both are still cached. Placeholder names are not
    /// trimmed, so `{ name }` is a different key than `{name}`.
    pub fn expand(&mut self, raw: &str, scope: &ExpansionScope) -> Result<String, ExpandError> {
        self.last_walk_steps = 0;

        let key = (scope.cache_key().map(str::to_string), raw.to_string());
        if let Some(cached) = self.cache.get(&key) {
            self.hits += 1;
            return Ok(cached.clone());
        }
        self.misses += 1;

        let mut in_progress = Vec::new();
        let expanded = self.substitute(raw, scope, &mut in_progress, 0)?;
        self.cache.insert(key, expanded.clone());
        Ok(expanded)
    }

    /// Number of reference-graph steps walked by the most recent `expand` call.
    /// A cache hit reports zero.
    pub fn last_walk_steps(&self) -> u64 {
        self.last_walk_steps
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            entries: self.cache.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }

    /// Drop all cached expansions. The table itself is unchanged.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Replace every placeholder in `text`, recursively resolving referenced
    /// variables. `in_progress` is the ordered stack of variables currently
    /// being resolved, used for cycle reporting.
    fn substitute(
        &mut self,
        text: &str,
        scope: &ExpansionScope,
        in_progress: &mut Vec<String>,
        depth: usize,
    ) -> Result<String, ExpandError> {
        if depth > MAX_RESOLUTION_DEPTH {
            return Err(ExpandError::DepthLimitExceeded {
                limit: MAX_RESOLUTION_DEPTH,
            });
        }

        // Collect matches up front so resolution can borrow self mutably.
        let matches: Vec<(usize, usize, String)> = self
            .placeholder
            .captures_iter(text)
            .map(|cap| {
                let whole = cap.get(0).expect("match without group 0");
                (whole.start(), whole.end(), cap[1].to_string())
            })
            .collect();

        if matches.is_empty() {
            return Ok(text.to_string());
        }

        let mut result = String::with_capacity(text.len());
        let mut cursor = 0;
        for (start, end, name) in matches {
            result.push_str(&text[cursor..start]);
            result.push_str(&self.resolve(&name, scope, in_progress, depth)?);
            cursor = end;
        }
        result.push_str(&text[cursor..]);
        Ok(result)
    }

    /// Resolve a single variable to its fully expanded value.
    fn resolve(
        &mut self,
        name: &str,
        scope: &ExpansionScope,
        in_progress: &mut Vec<String>,
        depth: usize,
    ) -> Result<String, ExpandError> {
        self.last_walk_steps += 1;

        if let Some(pos) = in_progress.iter().position(|n| n == name) {
            let mut cycle: Vec<String> = in_progress[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(ExpandError::CircularReference { cycle });
        }

        let raw_value = match scope.get(name).or_else(|| self.table.get(name)) {
            Some(value) => value.to_string(),
            None => {
                return Err(ExpandError::UnresolvedVariable {
                    name: name.to_string(),
                    available: self.available_names(scope),
                });
            }
        };

        // Fully resolved variables are cached keyed by their raw value.
        let key = (scope.cache_key().map(str::to_string), raw_value.clone());
        if let Some(cached) = self.cache.get(&key) {
            self.hits += 1;
            return Ok(cached.clone());
        }

        in_progress.push(name.to_string());
        let resolved = self.substitute(&raw_value, scope, in_progress, depth + 1)?;
        in_progress.pop();

        self.cache.insert(key, resolved.clone());
        Ok(resolved)
    }

    /// Sorted list of every resolvable name: scope overrides plus the global
    /// table.
    fn available_names(&self, scope: &ExpansionScope) -> Vec<String> {
        let mut available: Vec<String> = scope
            .overrides
            .keys()
            .chain(self.table.vars.keys())
            .cloned()
            .collect();
        available.sort();
        available.dedup();
        available
    }

    /// Produce a step-by-step expansion trace without touching the cache.
    ///
    /// Each entry records one substitution round: every placeholder present in
    /// the input is replaced by the referenced variable's raw value. The trace
    /// is a read-only diagnostic; calling this repeatedly with the same input
    /// and table yields identical output.
    pub fn expansion_trace(
        &self,
        raw: &str,
        scope: &ExpansionScope,
    ) -> Result<Vec<TraceEntry>, ExpandError> {
        let mut trace = Vec::new();
        let mut current = raw.to_string();
        let mut seen = HashSet::new();
        seen.insert(current.clone());

        for step in 1.. {
            let names: Vec<String> = self
                .placeholder
                .captures_iter(&current)
                .map(|cap| cap[1].to_string())
                .collect();
            if names.is_empty() {
                break;
            }
            if step > MAX_RESOLUTION_DEPTH {
                return Err(ExpandError::DepthLimitExceeded {
                    limit: MAX_RESOLUTION_DEPTH,
                });
            }

            let mut output = String::with_capacity(current.len());
            let mut cursor = 0;
            for cap in self.placeholder.captures_iter(&current) {
                let whole = cap.get(0).expect("match without group 0");
                let name = &cap[1];
                let value = scope.get(name).or_else(|| self.table.get(name)).ok_or_else(
                    || ExpandError::UnresolvedVariable {
                        name: name.to_string(),
                        available: self.available_names(scope),
                    },
                )?;
                output.push_str(&current[cursor..whole.start()]);
                output.push_str(value);
                cursor = whole.end();
            }
            output.push_str(&current[cursor..]);

            let mut variables_used = names;
            variables_used.dedup();

            trace.push(TraceEntry {
                step,
                input: current.clone(),
                output: output.clone(),
                variables_used: variables_used.clone(),
            });

            // A repeated intermediate string means substitution is looping.
            if !seen.insert(output.clone()) {
                return Err(ExpandError::CircularReference {
                    cycle: variables_used,
                });
            }
            current = output;
        }

        Ok(trace)
    }

    /// Static scan of which declared variables are referenced by any
    /// application path, which are declared but unused, and which are
    /// referenced but undeclared.
    ///
    /// References are followed transitively through variable definitions, so a
    /// variable used only by another referenced variable still counts as used.
    pub fn analyze_variable_usage(
        &self,
        applications: &IndexMap<String, ApplicationConfig>,
    ) -> VariableUsage {
        let mut usage = VariableUsage::default();
        let mut used: HashSet<String> = HashSet::new();
        let mut queue: Vec<String> = Vec::new();

        let mut record = |usage: &mut VariableUsage,
                          queue: &mut Vec<String>,
                          used: &mut HashSet<String>,
                          name: &str,
                          location: String| {
            *usage.usage_count.entry(name.to_string()).or_insert(0) += 1;
            usage
                .usage_locations
                .entry(name.to_string())
                .or_default()
                .push(location);
            if used.insert(name.to_string()) {
                queue.push(name.to_string());
            }
        };

        for (app_name, app) in applications {
            let sections = [
                ("base_path", &app.base_path_pairs),
                ("outputs", &app.output_pairs),
            ];
            for (kind, pairs) in sections {
                for pair in pairs.iter() {
                    for (side, text) in [("source", &pair.source), ("target", &pair.target)] {
                        for cap in self.placeholder.captures_iter(text) {
                            let location = format!("{app_name}.{kind}.{side}");
                            record(&mut usage, &mut queue, &mut used, &cap[1], location);
                        }
                    }
                }
            }
        }

        // Follow references through variable definitions.
        while let Some(name) = queue.pop() {
            let Some(value) = self.table.get(&name) else {
                continue;
            };
            let value = value.to_string();
            for cap in self.placeholder.captures_iter(&value) {
                record(
                    &mut usage,
                    &mut queue,
                    &mut used,
                    &cap[1],
                    format!("library_path.{name}"),
                );
            }
        }

        usage.used = self
            .table
            .names()
            .filter(|n| used.contains(*n))
            .map(str::to_string)
            .collect();
        usage.unused = self
            .table
            .names()
            .filter(|n| !used.contains(*n))
            .map(str::to_string)
            .collect();
        let mut missing: Vec<String> = used
            .into_iter()
            .filter(|n| self.table.get(n).is_none() && !BUILTIN_OVERRIDES.contains(&n.as_str()))
            .collect();
        missing.sort();
        usage.missing = missing;

        usage
    }
}
