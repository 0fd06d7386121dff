use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::scope::{ScopeId, ScopeType, Timing};
use crate::token::Prefix;
use crate::util::fast_map::{FxHashMap, FxHashSet, fx_hashmap_with_capacity};

const BUILTIN_VOCAB: &str = include_str!("vocab.yaml");

static BUILTIN: Lazy<Arc<ScopeTable>> = Lazy::new(|| match ScopeTable::from_yaml_str(BUILTIN_VOCAB) {
    Ok(table) => Arc::new(table),
    Err(err) => {
        error!("built-in vocabulary failed to load: {err:#}");
        Arc::new(ScopeTable::empty())
    }
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Var,
    LocalVar,
    GlobalVar,
}

impl VariableKind {
    pub fn from_prefix(prefix: Prefix) -> Option<Self> {
        match prefix {
            Prefix::Var => Some(VariableKind::Var),
            Prefix::LocalVar => Some(VariableKind::LocalVar),
            Prefix::GlobalVar => Some(VariableKind::GlobalVar),
            Prefix::Scope | Prefix::Flag => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VariableKind::Var => "var",
            VariableKind::LocalVar => "local_var",
            VariableKind::GlobalVar => "global_var",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VocabKind {
    Effect,
    Trigger,
}

#[derive(Debug, Clone)]
pub struct VocabEntry {
    pub name: String,
    pub kind: VocabKind,
    /// `None` when valid in every scope.
    pub scopes: Option<Vec<ScopeId>>,
    pub args: Vec<String>,
}

impl VocabEntry {
    pub fn valid_in(&self, scope: ScopeId) -> bool {
        self.scopes.as_ref().is_none_or(|s| s.contains(&scope))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum BlockTiming {
    Trigger,
    Effect,
    Neutral,
    Inherit,
}

/// Control block such as `limit`, `if` or `option`.
#[derive(Debug, Clone)]
pub struct BlockDef {
    pub name: String,
    timing: BlockTiming,
    /// Keys that are parameters of the block rather than statements.
    pub fields: Vec<String>,
}

impl BlockDef {
    pub fn timing(&self, enclosing: Timing) -> Timing {
        match self.timing {
            BlockTiming::Trigger => Timing::Trigger,
            BlockTiming::Effect => Timing::Effect,
            BlockTiming::Neutral => Timing::Neutral,
            BlockTiming::Inherit => enclosing,
        }
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IteratorKind {
    Any,
    Every,
    Random,
    Ordered,
}

impl IteratorKind {
    pub const ALL: [IteratorKind; 4] = [
        IteratorKind::Any,
        IteratorKind::Every,
        IteratorKind::Random,
        IteratorKind::Ordered,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            IteratorKind::Any => "any_",
            IteratorKind::Every => "every_",
            IteratorKind::Random => "random_",
            IteratorKind::Ordered => "ordered_",
        }
    }

    /// `any_` iterators are conditions, the rest execute effects.
    pub fn timing(self) -> Timing {
        match self {
            IteratorKind::Any => Timing::Trigger,
            _ => Timing::Effect,
        }
    }

    /// Parameters only this iterator kind accepts.
    pub fn params(self) -> &'static [&'static str] {
        match self {
            IteratorKind::Any => &["count", "percent"],
            IteratorKind::Every => &[],
            IteratorKind::Random => &["weight"],
            IteratorKind::Ordered => &["order_by", "position", "min", "max", "check_range_bounds"],
        }
    }

    /// Iterator for a parameter that belongs to exactly one kind.
    pub fn owner_of(param: &str) -> Option<IteratorKind> {
        IteratorKind::ALL.into_iter().find(|k| k.params().contains(&param))
    }
}

#[derive(Debug, Clone)]
pub struct ListDef {
    pub name: String,
    /// `None` when iterable from any scope.
    pub from: Option<Vec<ScopeId>>,
    pub to: ScopeId,
}

impl ListDef {
    pub fn iterable_from(&self, scope: ScopeId) -> bool {
        self.from.as_ref().is_none_or(|f| f.contains(&scope))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub token: String,
    pub target: ScopeId,
}

#[derive(Debug, Clone)]
pub struct ScopeDef {
    pub name: String,
    pub links: Vec<Link>,
    pub valid_effects: FxHashSet<String>,
    pub valid_triggers: FxHashSet<String>,
}

impl ScopeDef {
    pub fn link(&self, token: &str) -> Option<ScopeId> {
        self.links.iter().find(|l| l.token == token).map(|l| l.target)
    }
}

#[derive(Deserialize)]
struct RawTable {
    default_root: String,
    #[serde(default)]
    navigation: Vec<String>,
    scopes: BTreeMap<String, RawScope>,
    #[serde(default)]
    targets: BTreeMap<String, String>,
    #[serde(default)]
    lists: BTreeMap<String, RawList>,
    #[serde(default)]
    effects: BTreeMap<String, RawVocab>,
    #[serde(default)]
    triggers: BTreeMap<String, RawVocab>,
    #[serde(default)]
    blocks: BTreeMap<String, RawBlock>,
    #[serde(default)]
    event_types: BTreeMap<String, String>,
    #[serde(default)]
    event_fields: Vec<String>,
    #[serde(default)]
    saved_scope_effects: Vec<String>,
    #[serde(default)]
    saved_value_effects: Vec<String>,
    #[serde(default)]
    variable_effects: BTreeMap<String, VariableKind>,
}

#[derive(Deserialize, Default)]
struct RawScope {
    #[serde(default)]
    links: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RawList {
    #[serde(default)]
    from: Vec<String>,
    to: String,
}

#[derive(Deserialize, Default)]
struct RawVocab {
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    args: Vec<String>,
}

#[derive(Deserialize)]
struct RawBlock {
    timing: BlockTiming,
    #[serde(default)]
    fields: Vec<String>,
}

/// Immutable vocabulary: scopes and their links, effects, triggers, control
/// blocks, list iterators and event metadata.
#[derive(Debug, Clone)]
pub struct ScopeTable {
    scopes: Vec<ScopeDef>,
    by_name: FxHashMap<String, ScopeId>,
    default_root: ScopeId,
    navigation: FxHashSet<String>,
    // link token -> every scope it can lead to
    link_targets: FxHashMap<String, Vec<ScopeId>>,
    targets: FxHashMap<String, ScopeId>,
    lists: FxHashMap<String, ListDef>,
    effects: FxHashMap<String, VocabEntry>,
    triggers: FxHashMap<String, VocabEntry>,
    blocks: FxHashMap<String, BlockDef>,
    event_types: FxHashMap<String, ScopeId>,
    event_fields: FxHashSet<String>,
    saved_scope_effects: FxHashSet<String>,
    saved_value_effects: FxHashSet<String>,
    variable_effects: FxHashMap<String, VariableKind>,
}

impl ScopeTable {
    /// Process-wide table built from the embedded vocabulary.
    pub fn builtin() -> Arc<ScopeTable> {
        BUILTIN.clone()
    }

    pub fn from_yaml_str(src: &str) -> Result<Self> {
        let raw: RawTable = serde_yaml::from_str(src).context("invalid vocabulary yaml")?;
        Self::build(raw)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let src = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read vocabulary {}", path.display()))?;
        Self::from_yaml_str(&src).with_context(|| format!("failed to load vocabulary {}", path.display()))
    }

    /// A table with a single scope and no vocabulary.
    pub fn empty() -> Self {
        let mut by_name = FxHashMap::default();
        by_name.insert("none".to_string(), ScopeId(0));
        Self {
            scopes: vec![ScopeDef {
                name: "none".to_string(),
                links: Vec::new(),
                valid_effects: FxHashSet::default(),
                valid_triggers: FxHashSet::default(),
            }],
            by_name,
            default_root: ScopeId(0),
            navigation: FxHashSet::default(),
            link_targets: FxHashMap::default(),
            targets: FxHashMap::default(),
            lists: FxHashMap::default(),
            effects: FxHashMap::default(),
            triggers: FxHashMap::default(),
            blocks: FxHashMap::default(),
            event_types: FxHashMap::default(),
            event_fields: FxHashSet::default(),
            saved_scope_effects: FxHashSet::default(),
            saved_value_effects: FxHashSet::default(),
            variable_effects: FxHashMap::default(),
        }
    }

    fn build(raw: RawTable) -> Result<Self> {
        if raw.scopes.len() > u16::MAX as usize {
            bail!("too many scopes: {}", raw.scopes.len());
        }
        let mut by_name = fx_hashmap_with_capacity(raw.scopes.len());
        for (i, name) in raw.scopes.keys().enumerate() {
            by_name.insert(name.clone(), ScopeId(i as u16));
        }
        let resolve = |name: &str, what: &str| -> Result<ScopeId> {
            by_name
                .get(name)
                .copied()
                .with_context(|| format!("unknown scope `{name}` in {what}"))
        };
        let resolve_all = |names: &[String], what: &str| -> Result<Option<Vec<ScopeId>>> {
            if names.is_empty() || names.iter().any(|n| n == "any") {
                return Ok(None);
            }
            names.iter().map(|n| resolve(n, what)).collect::<Result<Vec<_>>>().map(Some)
        };

        let mut scopes = Vec::with_capacity(raw.scopes.len());
        let mut link_targets: FxHashMap<String, Vec<ScopeId>> = FxHashMap::default();
        for (name, def) in &raw.scopes {
            let mut links = Vec::with_capacity(def.links.len());
            for (token, target) in &def.links {
                let target = resolve(target, &format!("links of `{name}`"))?;
                let entry = link_targets.entry(token.clone()).or_default();
                if !entry.contains(&target) {
                    entry.push(target);
                }
                links.push(Link {
                    token: token.clone(),
                    target,
                });
            }
            scopes.push(ScopeDef {
                name: name.clone(),
                links,
                valid_effects: FxHashSet::default(),
                valid_triggers: FxHashSet::default(),
            });
        }

        let mut vocab = |raw: BTreeMap<String, RawVocab>, kind: VocabKind| -> Result<FxHashMap<String, VocabEntry>> {
            let mut out = fx_hashmap_with_capacity(raw.len());
            for (name, entry) in raw {
                let valid = resolve_all(&entry.scopes, &format!("`{name}`"))?;
                for (i, scope) in scopes.iter_mut().enumerate() {
                    if valid.as_ref().is_none_or(|v| v.contains(&ScopeId(i as u16))) {
                        match kind {
                            VocabKind::Effect => scope.valid_effects.insert(name.clone()),
                            VocabKind::Trigger => scope.valid_triggers.insert(name.clone()),
                        };
                    }
                }
                out.insert(
                    name.clone(),
                    VocabEntry {
                        name,
                        kind,
                        scopes: valid,
                        args: entry.args,
                    },
                );
            }
            Ok(out)
        };
        let effects = vocab(raw.effects, VocabKind::Effect)?;
        let triggers = vocab(raw.triggers, VocabKind::Trigger)?;

        let mut lists = fx_hashmap_with_capacity(raw.lists.len());
        for (name, list) in raw.lists {
            let what = format!("list `{name}`");
            let def = ListDef {
                from: resolve_all(&list.from, &what)?,
                to: resolve(&list.to, &what)?,
                name: name.clone(),
            };
            lists.insert(name, def);
        }

        let mut targets = fx_hashmap_with_capacity(raw.targets.len());
        for (prefix, scope) in raw.targets {
            let id = resolve(&scope, &format!("target `{prefix}:`"))?;
            targets.insert(prefix, id);
        }

        let mut event_types = fx_hashmap_with_capacity(raw.event_types.len());
        for (ty, scope) in raw.event_types {
            let id = resolve(&scope, &format!("event type `{ty}`"))?;
            event_types.insert(ty, id);
        }

        let blocks = raw
            .blocks
            .into_iter()
            .map(|(name, b)| {
                let def = BlockDef {
                    name: name.clone(),
                    timing: b.timing,
                    fields: b.fields,
                };
                (name, def)
            })
            .collect();

        let default_root = resolve(&raw.default_root, "default_root")?;
        let table = Self {
            scopes,
            by_name,
            default_root,
            navigation: raw.navigation.into_iter().collect(),
            link_targets,
            targets,
            lists,
            effects,
            triggers,
            blocks,
            event_types,
            event_fields: raw.event_fields.into_iter().collect(),
            saved_scope_effects: raw.saved_scope_effects.into_iter().collect(),
            saved_value_effects: raw.saved_value_effects.into_iter().collect(),
            variable_effects: raw.variable_effects.into_iter().collect(),
        };
        debug!(
            scopes = table.scopes.len(),
            effects = table.effects.len(),
            triggers = table.triggers.len(),
            "scope table built"
        );
        Ok(table)
    }

    pub fn scope_id(&self, name: &str) -> Option<ScopeId> {
        self.by_name.get(name).copied()
    }

    pub fn scope(&self, id: ScopeId) -> &ScopeDef {
        &self.scopes[id.0 as usize]
    }

    pub fn scope_name(&self, id: ScopeId) -> &str {
        &self.scope(id).name
    }

    /// Display name for any scope type.
    pub fn describe(&self, scope: ScopeType) -> &str {
        match scope {
            ScopeType::Known(id) => self.scope_name(id),
            ScopeType::Unknown => "unknown",
            ScopeType::Unassigned => "unassigned",
        }
    }

    pub fn scopes(&self) -> impl Iterator<Item = (ScopeId, &ScopeDef)> {
        self.scopes.iter().enumerate().map(|(i, s)| (ScopeId(i as u16), s))
    }

    pub fn default_root(&self) -> ScopeId {
        self.default_root
    }

    pub fn is_navigation(&self, token: &str) -> bool {
        self.navigation.contains(token)
    }

    pub fn link(&self, from: ScopeId, token: &str) -> Option<ScopeId> {
        self.scope(from).link(token)
    }

    /// Every scope `token` leads to from some scope; empty when it is no link.
    pub fn link_targets(&self, token: &str) -> &[ScopeId] {
        self.link_targets.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_link(&self, token: &str) -> bool {
        self.link_targets.contains_key(token)
    }

    /// Scope of a typed target such as `title:k_france`.
    pub fn typed_target(&self, segment: &str) -> Option<ScopeId> {
        let (prefix, rest) = segment.split_once(':')?;
        if rest.is_empty() {
            return None;
        }
        self.targets.get(prefix).copied()
    }

    pub fn effect(&self, name: &str) -> Option<&VocabEntry> {
        self.effects.get(name)
    }

    pub fn trigger(&self, name: &str) -> Option<&VocabEntry> {
        self.triggers.get(name)
    }

    /// The entry `name` denotes in a `timing` context. Neutral contexts prefer
    /// triggers.
    pub fn vocab(&self, name: &str, timing: Timing) -> Option<&VocabEntry> {
        match timing {
            Timing::Effect => self.effect(name).or_else(|| self.trigger(name)),
            Timing::Trigger | Timing::Neutral => self.trigger(name).or_else(|| self.effect(name)),
        }
    }

    pub fn block(&self, name: &str) -> Option<&BlockDef> {
        self.blocks.get(name)
    }

    pub fn list(&self, name: &str) -> Option<&ListDef> {
        self.lists.get(name)
    }

    /// `any_vassal` -> (Any, vassal list).
    pub fn iterator(&self, key: &str) -> Option<(IteratorKind, &ListDef)> {
        IteratorKind::ALL.into_iter().find_map(|kind| {
            let list = key.strip_prefix(kind.prefix())?;
            self.lists.get(list).map(|def| (kind, def))
        })
    }

    pub fn event_root(&self, event_type: &str) -> Option<ScopeId> {
        self.event_types.get(event_type).copied()
    }

    pub fn is_event_field(&self, key: &str) -> bool {
        self.event_fields.contains(key)
    }

    pub fn is_saved_scope_effect(&self, key: &str) -> bool {
        self.saved_scope_effects.contains(key)
    }

    pub fn is_saved_value_effect(&self, key: &str) -> bool {
        self.saved_value_effects.contains(key)
    }

    pub fn variable_effect(&self, key: &str) -> Option<VariableKind> {
        self.variable_effects.get(key).copied()
    }

    /// Whether `key` means anything in statement position.
    pub fn is_known_key(&self, key: &str) -> bool {
        self.blocks.contains_key(key)
            || self.effects.contains_key(key)
            || self.triggers.contains_key(key)
            || self.is_navigation(key)
            || self.is_link(key)
            || self.iterator(key).is_some()
    }

    /// Closest known statement key, for "did you mean" hints.
    pub fn suggest(&self, key: &str) -> Option<String> {
        let limit = (key.chars().count() / 4).clamp(1, 3);
        let iterators = self
            .lists
            .keys()
            .flat_map(|l| IteratorKind::ALL.into_iter().map(move |k| format!("{}{}", k.prefix(), l)));
        self.effects
            .keys()
            .chain(self.triggers.keys())
            .chain(self.blocks.keys())
            .chain(self.link_targets.keys())
            .cloned()
            .chain(iterators)
            .map(|candidate| (strsim::levenshtein(key, &candidate), candidate))
            .filter(|(dist, _)| *dist <= limit)
            .min_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
            .map(|(_, candidate)| candidate)
    }
}
