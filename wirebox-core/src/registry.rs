//! Bean registry: selectors, candidate lookup and the condition-driven resolve phase.

use std::fmt;

use tracing::debug;

use crate::bean::{BeanDefinition, BeanInfo, BeanStatus, TypeKey};
use crate::condition::{BeanLookup, CondContext, Condition, Outcome};
use crate::error::{CoreError, Result};
use crate::inject::BeanHandle;
use crate::properties::Properties;

/// Matches zero or more beans.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// Exact bean id.
    Id(String),
    /// Type name, written `Name:` in string form.
    TypeName(String),
    /// Concrete or exported type.
    Type(TypeKey),
    /// `*`: every candidate.
    All,
}

impl Selector {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Selector::Type(TypeKey::of::<T>())
    }

    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s == "*" {
            Selector::All
        } else if let Some(name) = s.strip_suffix(':') {
            Selector::TypeName(name.to_owned())
        } else {
            Selector::Id(s.to_owned())
        }
    }

    pub fn matches(&self, bean: &BeanDefinition) -> bool {
        match self {
            Selector::Id(id) => bean.id == *id,
            Selector::TypeName(name) => {
                bean.type_key.name_matches(name) || bean.exports().any(|k| k.name_matches(name))
            }
            Selector::Type(key) => bean.export_for(*key).is_some(),
            Selector::All => true,
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        Selector::parse(s)
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::parse(&s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Id(id) => f.write_str(id),
            Selector::TypeName(name) => write!(f, "{}:", name),
            Selector::Type(key) => f.write_str(key.name()),
            Selector::All => f.write_str("*"),
        }
    }
}

/// Parsed `autowire` tag: `""`, `"?"`, `"id"`, `"id1,id2,*"`, optionally ending in `?`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AutowireTag {
    pub selectors: Vec<Selector>,
    pub optional: bool,
}

impl AutowireTag {
    pub fn parse(tag: &str) -> Result<Self> {
        let mut tag = tag.trim();
        let optional = tag.ends_with('?');
        if optional {
            tag = tag[..tag.len() - 1].trim_end();
        }
        let mut selectors = Vec::new();
        if !tag.is_empty() {
            for part in tag.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    return Err(CoreError::Usage(format!("empty selector in autowire tag {:?}", tag)));
                }
                selectors.push(Selector::parse(part));
            }
        }
        if selectors.iter().filter(|s| **s == Selector::All).count() > 1 {
            return Err(CoreError::Usage(format!("autowire tag {:?} repeats '*'", tag)));
        }
        Ok(Self { selectors, optional })
    }

    pub fn is_auto(&self) -> bool {
        self.selectors.is_empty() || self.selectors == [Selector::All]
    }
}

impl From<Selector> for AutowireTag {
    fn from(selector: Selector) -> Self {
        Self {
            selectors: vec![selector],
            optional: false,
        }
    }
}

impl fmt::Display for AutowireTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.selectors.iter().map(ToString::to_string).collect();
        write!(f, "{}{}", parts.join(","), if self.optional { "?" } else { "" })
    }
}

/// Owns every bean definition; indexes are stable handles.
#[derive(Default)]
pub struct Registry {
    pub(crate) beans: Vec<BeanDefinition>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, def: BeanDefinition) -> usize {
        self.beans.push(def);
        self.beans.len() - 1
    }

    pub fn len(&self) -> usize {
        self.beans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beans.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&BeanDefinition> {
        self.beans.get(idx)
    }

    pub(crate) fn bean(&self, idx: usize) -> &BeanDefinition {
        &self.beans[idx]
    }

    pub(crate) fn bean_mut(&mut self, idx: usize) -> &mut BeanDefinition {
        &mut self.beans[idx]
    }

    /// Every non-deleted bean matching `selector`, whatever its wiring state.
    pub fn find(&self, selector: &Selector) -> Vec<usize> {
        (0..self.beans.len())
            .filter(|&i| self.beans[i].is_alive() && selector.matches(&self.beans[i]))
            .collect()
    }

    /// Beans that can be injected as `want` for `tag`, in injection order.
    ///
    /// Auto mode (no selector, or only `*`) sorts by `order`, ties by registration.
    /// Assigned mode keeps the selector order; `*` splices the remaining candidates there.
    pub fn select(&self, want: TypeKey, tag: &AutowireTag) -> Result<Vec<usize>> {
        let candidates: Vec<usize> = (0..self.beans.len())
            .filter(|&i| {
                let b = &self.beans[i];
                b.status >= BeanStatus::Resolved && b.is_alive() && b.export_for(want).is_some()
            })
            .collect();
        if tag.is_auto() {
            return Ok(self.by_order(candidates));
        }

        let mut picked: Vec<usize> = Vec::new();
        let mut star_at = None;
        for selector in &tag.selectors {
            if *selector == Selector::All {
                star_at = Some(picked.len());
                continue;
            }
            let matched: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|&i| selector.matches(&self.beans[i]))
                .collect();
            match matched.as_slice() {
                [] if tag.optional => {}
                [] => {
                    return Err(CoreError::Unresolved(format!(
                        "can't find bean, selector={} type={}",
                        selector,
                        want.name()
                    )))
                }
                [one] => {
                    if !picked.contains(one) {
                        picked.push(*one);
                    }
                }
                many => {
                    return Err(CoreError::Unresolved(format!(
                        "found {} beans, selector={} type={}: [{}]",
                        many.len(),
                        selector,
                        want.name(),
                        self.ids(many)
                    )))
                }
            }
        }
        if let Some(at) = star_at {
            let rest: Vec<usize> = candidates
                .into_iter()
                .filter(|i| !picked.contains(i))
                .collect();
            let rest = self.by_order(rest);
            picked.splice(at..at, rest);
        }
        Ok(picked)
    }

    pub(crate) fn handle(&self, idx: usize, want: TypeKey) -> Option<BeanHandle> {
        let bean = self.beans.get(idx)?;
        Some(BeanHandle {
            id: bean.id.clone(),
            slot: bean.slot.clone(),
            export: bean.export_for(want)?.clone(),
        })
    }

    pub(crate) fn infos(&self, idxs: &[usize]) -> Vec<BeanInfo> {
        idxs.iter().map(|&i| self.beans[i].info()).collect()
    }

    fn by_order(&self, mut idxs: Vec<usize>) -> Vec<usize> {
        idxs.sort_by_key(|&i| self.beans[i].order);
        idxs
    }

    pub(crate) fn ids(&self, idxs: &[usize]) -> String {
        idxs.iter()
            .map(|&i| self.beans[i].id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Phase A: evaluates conditions until a fixed point.
    ///
    /// A bean whose condition still depends on undecided beans waits for a later pass;
    /// beans left waiting when no pass makes progress are reported together.
    pub fn resolve(&mut self, props: &Properties) -> Result<()> {
        for bean in &self.beans {
            if let Some(reason) = &bean.invalid {
                return Err(CoreError::Usage(format!("bean '{}': {}", bean.id, reason)));
            }
        }
        loop {
            let mut progress = false;
            for idx in 0..self.beans.len() {
                if self.beans[idx].status != BeanStatus::Default {
                    continue;
                }
                self.beans[idx].status = BeanStatus::Resolving;
                let outcome = match self.beans[idx].condition.clone() {
                    None => Outcome::Matched,
                    Some(cond) => {
                        let ctx = ResolveContext {
                            registry: self,
                            props,
                            me: idx,
                        };
                        cond.evaluate(&ctx).map_err(|e| {
                            CoreError::Unresolved(format!(
                                "condition of bean '{}' failed: {}",
                                self.beans[idx].id, e
                            ))
                        })?
                    }
                };
                let bean = &mut self.beans[idx];
                bean.status = match outcome {
                    Outcome::Matched => BeanStatus::Resolved,
                    Outcome::Unmatched => BeanStatus::Deleted,
                    Outcome::Pending(_) => BeanStatus::Default,
                };
                if bean.status != BeanStatus::Default {
                    progress = true;
                    debug!(bean = %bean.id, status = ?bean.status, "bean resolved");
                }
            }
            if !progress {
                break;
            }
        }

        let mut waiting = Vec::new();
        for idx in 0..self.beans.len() {
            if self.beans[idx].status != BeanStatus::Default {
                continue;
            }
            let pending = match &self.beans[idx].condition {
                Some(cond) => {
                    let ctx = ResolveContext {
                        registry: self,
                        props,
                        me: idx,
                    };
                    match cond.evaluate(&ctx) {
                        Ok(Outcome::Pending(ids)) => ids,
                        _ => Vec::new(),
                    }
                }
                None => Vec::new(),
            };
            waiting.push(format!("{} (waiting on: {})", self.beans[idx].id, pending.join(", ")));
        }
        if !waiting.is_empty() {
            return Err(CoreError::Unresolved(format!(
                "beans can't be resolved: {}",
                waiting.join("; ")
            )));
        }
        self.check_unique_ids()
    }

    fn check_unique_ids(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for bean in self.beans.iter().filter(|b| b.is_alive()) {
            if !seen.insert(bean.id.as_str()) {
                return Err(CoreError::Usage(format!("found duplicate bean id '{}'", bean.id)));
            }
        }
        Ok(())
    }

    /// Evaluates `cond` against the current registry, for call-time `Option` args.
    pub(crate) fn matches(&self, props: &Properties, cond: &Condition) -> Result<bool> {
        cond.matches(&ResolveContext {
            registry: self,
            props,
            me: usize::MAX,
        })
    }
}

struct ResolveContext<'a> {
    registry: &'a Registry,
    props: &'a Properties,
    me: usize,
}

impl CondContext for ResolveContext<'_> {
    fn properties(&self) -> &Properties {
        self.props
    }

    fn lookup(&self, selector: &Selector) -> BeanLookup {
        let mut lookup = BeanLookup::default();
        for (idx, bean) in self.registry.beans.iter().enumerate() {
            if idx == self.me || !bean.is_alive() || !selector.matches(bean) {
                continue;
            }
            match bean.status {
                BeanStatus::Default | BeanStatus::Resolving => lookup.pending.push(bean.id.clone()),
                _ => lookup.resolved.push(bean.id.clone()),
            }
        }
        lookup
    }
}
