//! Unit evaluation - expand units into a catalog of resource assertions
//!
//! Evaluation is single-threaded and run-to-completion for one node.
//! Units are memoized per effective parameter set: re-including a unit
//! with equal parameters is a no-op that changes nothing, re-including it
//! with different parameters aborts the run. Includes form a DAG; a cycle
//! through the live inclusion stack is fatal.

use crate::error::EvalError;
use crate::facts::Node;
use crate::lookup::LookupService;
use crate::unit::{ParamSource, ResourceTemplate, UnitDef};
use catalog::{AttrValue, Catalog, ResourceAssertion};
use std::collections::{BTreeMap, HashMap};

/// Root referrer recorded for units listed directly by the role
const ROLE_REFERRER: &str = "role";

pub struct Evaluator<'a> {
    units: &'a BTreeMap<String, UnitDef>,
    node: &'a Node,
    lookup: &'a dyn LookupService,
    /// Effective parameters of every unit included so far
    included: HashMap<String, BTreeMap<String, AttrValue>>,
    /// Live inclusion stack, for cycle detection and diagnostics
    stack: Vec<String>,
    /// Resource templates registered by tag, rendered at publish time
    published: Vec<(Vec<String>, ResourceAssertion)>,
    /// Tags requested for final assembly, in request order
    collected: Vec<String>,
    catalog: Catalog,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        units: &'a BTreeMap<String, UnitDef>,
        node: &'a Node,
        lookup: &'a dyn LookupService,
    ) -> Self {
        Self {
            units,
            node,
            lookup,
            included: HashMap::new(),
            stack: Vec::new(),
            published: Vec::new(),
            collected: Vec::new(),
            catalog: Catalog::new(),
        }
    }

    /// Evaluate an ordered list of units (a resolved role) into a catalog
    pub fn evaluate_role(mut self, unit_names: &[String]) -> Result<Catalog, EvalError> {
        for name in unit_names {
            self.include(name, None)?;
        }
        self.assemble()?;
        Ok(self.catalog)
    }

    /// Include one unit, memoized on its effective parameter set
    fn include(
        &mut self,
        name: &str,
        overrides: Option<&BTreeMap<String, AttrValue>>,
    ) -> Result<(), EvalError> {
        if self.stack.iter().any(|u| u == name) {
            let mut path: Vec<&str> = self.stack.iter().map(String::as_str).collect();
            path.push(name);
            return Err(EvalError::CyclicUnit {
                unit: name.to_string(),
                path: path.join(" -> "),
            });
        }

        let referrer = self
            .stack
            .last()
            .map_or(ROLE_REFERRER, String::as_str)
            .to_string();
        let unit = self.units.get(name).ok_or_else(|| EvalError::UnknownUnit {
            unit: name.to_string(),
            referrer: referrer.clone(),
        })?;

        let params = self.resolve_params(name, unit, overrides)?;

        if let Some(previous) = self.included.get(name) {
            if unit.private {
                return Err(EvalError::PrivateReinclusion {
                    unit: name.to_string(),
                    referrer,
                });
            }
            return match first_param_conflict(previous, &params) {
                // Same effective parameters: evaluation is referentially
                // transparent, so the assertions are already in the catalog
                None => Ok(()),
                Some(parameter) => Err(EvalError::ConflictingInclusion {
                    unit: name.to_string(),
                    parameter: parameter.to_string(),
                }),
            };
        }

        log::debug!("evaluating unit '{name}' for node '{}'", self.node.name);
        self.included.insert(name.to_string(), params.clone());
        self.stack.push(name.to_string());

        for template in &unit.resources {
            let assertion = self.render(name, template, &params)?;
            if template.publish.is_empty() {
                self.catalog.insert(assertion)?;
            } else {
                self.published.push((template.publish.clone(), assertion));
            }
        }
        for tag in &unit.collect {
            if !self.collected.iter().any(|t| t == tag) {
                self.collected.push(tag.clone());
            }
        }
        for include in &unit.include {
            self.include(include.unit(), include.overrides())?;
        }

        self.stack.pop();
        Ok(())
    }

    /// Resolve the effective parameter set for one inclusion
    ///
    /// Each declared parameter resolves from its single declared source;
    /// include-time overrides replace the declared resolution and must
    /// name declared parameters.
    fn resolve_params(
        &self,
        name: &str,
        unit: &UnitDef,
        overrides: Option<&BTreeMap<String, AttrValue>>,
    ) -> Result<BTreeMap<String, AttrValue>, EvalError> {
        if let Some(overrides) = overrides {
            for key in overrides.keys() {
                if !unit.params.contains_key(key) {
                    return Err(EvalError::UnknownParameter {
                        unit: name.to_string(),
                        parameter: key.clone(),
                    });
                }
            }
        }

        let mut params = BTreeMap::new();
        for (param, source) in &unit.params {
            if let Some(value) = overrides.and_then(|o| o.get(param)) {
                params.insert(param.clone(), value.clone());
                continue;
            }
            let value = match source {
                ParamSource::Constant { value } => value.clone(),
                ParamSource::FromFact { from_fact, derive } => {
                    let fact = self.node.facts.get(from_fact).ok_or_else(|| {
                        EvalError::MissingFact {
                            unit: name.to_string(),
                            parameter: param.clone(),
                            fact: from_fact.clone(),
                        }
                    })?;
                    match derive {
                        Some(derivation) => derivation.apply(fact).map_err(|message| {
                            EvalError::Derivation {
                                unit: name.to_string(),
                                parameter: param.clone(),
                                message,
                            }
                        })?,
                        None => fact.clone(),
                    }
                }
                ParamSource::Lookup { lookup } => {
                    let key = lookup
                        .key
                        .clone()
                        .unwrap_or_else(|| format!("{name}.{param}"));
                    match self.lookup.get(&key).or_else(|| lookup.default.clone()) {
                        Some(value) => value,
                        None => {
                            return Err(EvalError::MissingLookup {
                                unit: name.to_string(),
                                parameter: param.clone(),
                                key,
                            });
                        }
                    }
                }
            };
            params.insert(param.clone(), value);
        }
        Ok(params)
    }

    /// Render a resource template into a concrete assertion
    fn render(
        &self,
        unit: &str,
        template: &ResourceTemplate,
        params: &BTreeMap<String, AttrValue>,
    ) -> Result<ResourceAssertion, EvalError> {
        let id = self.render_string(unit, &template.name, params)?;
        let mut assertion = ResourceAssertion::new(template.kind, id);
        for (key, value) in &template.attrs {
            let rendered = self.render_value(unit, value, params)?;
            assertion.attributes.insert(key.clone(), rendered);
        }
        Ok(assertion)
    }

    /// Interpolate `${param}` references in an attribute value
    ///
    /// A string that is exactly one reference keeps the parameter's type;
    /// embedded references substitute their display form.
    fn render_value(
        &self,
        unit: &str,
        value: &AttrValue,
        params: &BTreeMap<String, AttrValue>,
    ) -> Result<AttrValue, EvalError> {
        match value {
            AttrValue::String(s) => {
                if let Some(param) = s.strip_prefix("${").and_then(|r| r.strip_suffix('}'))
                    && !param.contains("${")
                    && !param.contains('}')
                {
                    return params.get(param).cloned().ok_or_else(|| {
                        EvalError::UnknownParameter {
                            unit: unit.to_string(),
                            parameter: param.to_string(),
                        }
                    });
                }
                Ok(AttrValue::String(self.render_string(unit, s, params)?))
            }
            AttrValue::List(items) => Ok(AttrValue::List(
                items
                    .iter()
                    .map(|item| self.render_value(unit, item, params))
                    .collect::<Result<_, _>>()?,
            )),
            other => Ok(other.clone()),
        }
    }

    fn render_string(
        &self,
        unit: &str,
        template: &str,
        params: &BTreeMap<String, AttrValue>,
    ) -> Result<String, EvalError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                // Unterminated reference passes through literally
                out.push_str(&rest[start..]);
                return Ok(out);
            };
            let param = &after[..end];
            let value = params.get(param).ok_or_else(|| EvalError::UnknownParameter {
                unit: unit.to_string(),
                parameter: param.to_string(),
            })?;
            out.push_str(&value.to_string());
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Final assembly: emit published templates for every collected tag
    fn assemble(&mut self) -> Result<(), EvalError> {
        for tag in &self.collected {
            for (tags, assertion) in &self.published {
                if tags.iter().any(|t| t == tag) {
                    // Identical duplicates merge when two tags select the
                    // same template
                    self.catalog.insert(assertion.clone())?;
                }
            }
        }
        Ok(())
    }
}

fn first_param_conflict<'a>(
    a: &'a BTreeMap<String, AttrValue>,
    b: &'a BTreeMap<String, AttrValue>,
) -> Option<&'a str> {
    a.keys()
        .chain(b.keys())
        .find(|key| a.get(*key) != b.get(*key))
        .map(String::as_str)
}

/// Evaluate a single unit outside any role (spec operation `evaluate`)
pub fn evaluate_unit(
    units: &BTreeMap<String, UnitDef>,
    node: &Node,
    lookup: &dyn LookupService,
    unit_name: &str,
) -> Result<Catalog, EvalError> {
    Evaluator::new(units, node, lookup).evaluate_role(&[unit_name.to_string()])
}
