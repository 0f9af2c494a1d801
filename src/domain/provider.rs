//! Node factories: typed nodes from JSON items, one closed vocabulary per structure

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::entities::{
    ArtifactFlags, ContainerVariant, LeafVariant, Procedure, TemplateProcedure, TreeNode,
    Vulnerability,
};
use crate::domain::error::{TreeError, TreeResult};
use crate::domain::json::NodeJson;

/// Builds the concrete node for one JSON item, dispatching on its `type`.
///
/// An unknown type or an item that does not fit its type fails the whole parse.
pub trait NodeFactory {
    /// Vocabulary name used in error messages
    fn name(&self) -> &'static str;

    /// Accepted `type` discriminators
    fn types(&self) -> &'static [&'static str];

    /// Language used for display names and written titles
    fn language(&self) -> &str;

    fn create_node(&self, item: &NodeJson) -> TreeResult<TreeNode>;
}

/// Resolves display names of procedures from their source template.
pub trait NameResolver {
    fn procedure_name(&self, template: &str, language: &str) -> Option<String>;
}

/// Resolver that knows no names; nodes fall back to their own fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoResolver;

impl NameResolver for NoResolver {
    fn procedure_name(&self, _template: &str, _language: &str) -> Option<String> {
        None
    }
}

impl<F> NameResolver for F
where
    F: Fn(&str, &str) -> Option<String>,
{
    fn procedure_name(&self, template: &str, language: &str) -> Option<String> {
        self(template, language)
    }
}

/// Which vocabulary a structure file uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    #[default]
    Report,
    TestGuide,
    Generic,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Report => "report",
            Self::TestGuide => "test-guide",
            Self::Generic => "generic",
        };
        f.write_str(name)
    }
}

/// Text of a plain or language-keyed value (`"x"` or `{"en": "x", "de": "y"}`).
///
/// Falls back to any string of the map when the language is missing.
pub fn localized(value: Option<&Value>, language: &str) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get(language)
            .and_then(Value::as_str)
            .or_else(|| map.values().find_map(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

/// Store `text` under `key`: into the language slot of a language-keyed value,
/// replacing anything else.
pub fn set_localized(fields: &mut Map<String, Value>, key: &str, language: &str, text: &str) {
    match fields.get_mut(key) {
        Some(Value::Object(by_language)) => {
            by_language.insert(language.to_string(), Value::String(text.to_string()));
        }
        _ => {
            fields.insert(key.to_string(), Value::String(text.to_string()));
        }
    }
}

fn field<T: DeserializeOwned + Default>(item: &NodeJson, key: &str) -> TreeResult<T> {
    match item.extra.get(key) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => T::deserialize(value)
            .map_err(|e| TreeError::malformed(format!("{}: field '{key}': {e}", item.id))),
    }
}

fn container_node(item: &NodeJson, variant: ContainerVariant, language: &str) -> TreeNode {
    let info = item.info.clone().unwrap_or_default();
    let name = localized(info.get("title"), language).unwrap_or_else(|| item.id.clone());
    TreeNode::container(&item.id, name, variant, info).with_extra(item.extra.clone())
}

fn leaf_name(item: &NodeJson, language: &str) -> String {
    localized(item.extra.get("title"), language)
        .or_else(|| localized(item.extra.get("name"), language))
        .unwrap_or_else(|| item.id.clone())
}

/// Explicit title first, then the template's name, then `name` or the id.
fn display_name(
    item: &NodeJson,
    template: Option<&str>,
    resolver: &dyn NameResolver,
    language: &str,
) -> String {
    localized(item.extra.get("title"), language)
        .or_else(|| template.and_then(|t| resolver.procedure_name(t, language)))
        .unwrap_or_else(|| leaf_name(item, language))
}

fn ensure_childless(item: &NodeJson) -> TreeResult<()> {
    if item.children().is_empty() {
        Ok(())
    } else {
        Err(TreeError::malformed(format!(
            "{}: '{}' nodes cannot have children",
            item.id, item.node_type
        )))
    }
}

fn unknown(provider: &'static str, item: &NodeJson) -> TreeError {
    TreeError::UnknownType {
        provider,
        type_name: item.node_type.clone(),
    }
}

/// Plain `container | leaf` vocabulary.
#[derive(Debug, Clone)]
pub struct GenericProvider {
    language: String,
}

impl Default for GenericProvider {
    fn default() -> Self {
        Self::new("en")
    }
}

impl GenericProvider {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }
}

impl NodeFactory for GenericProvider {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn types(&self) -> &'static [&'static str] {
        &["container", "leaf"]
    }

    fn create_node(&self, item: &NodeJson) -> TreeResult<TreeNode> {
        match item.node_type.as_str() {
            "container" => Ok(container_node(item, ContainerVariant::Section, &self.language)),
            "leaf" => {
                ensure_childless(item)?;
                Ok(
                    TreeNode::leaf(&item.id, leaf_name(item, &self.language), LeafVariant::Item)
                        .with_extra(item.extra.clone()),
                )
            }
            _ => Err(unknown(self.name(), item)),
        }
    }
}

/// Report structure: sections, playbooks, procedure sections, procedures, vulnerabilities.
pub struct ReportStructureProvider {
    language: String,
    resolver: Box<dyn NameResolver>,
}

impl fmt::Debug for ReportStructureProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportStructureProvider")
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

impl Default for ReportStructureProvider {
    fn default() -> Self {
        Self::new("en")
    }
}

impl ReportStructureProvider {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            resolver: Box::new(NoResolver),
        }
    }

    pub fn with_resolver(mut self, resolver: impl NameResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    fn procedure(&self, item: &NodeJson) -> TreeResult<TreeNode> {
        ensure_childless(item)?;
        let procedure = Procedure {
            status: field(item, "status")?,
            priority: field(item, "priority")?,
            template: field(item, "template")?,
        };
        let name = display_name(
            item,
            procedure.template.as_deref(),
            &*self.resolver,
            &self.language,
        );
        Ok(TreeNode::leaf(&item.id, name, LeafVariant::Procedure(procedure))
            .with_extra(item.extra.clone()))
    }

    fn vulnerability(&self, item: &NodeJson) -> TreeResult<TreeNode> {
        ensure_childless(item)?;
        let vulnerability = Vulnerability {
            severity: field(item, "severity")?,
            status: field(item, "status")?,
            artifacts: ArtifactFlags {
                evidence: field(item, "hasEvidence")?,
                requests: field(item, "hasRequests")?,
                screenshots: field(item, "hasScreenshots")?,
            },
        };
        Ok(TreeNode::leaf(
            &item.id,
            leaf_name(item, &self.language),
            LeafVariant::Vulnerability(vulnerability),
        )
        .with_extra(item.extra.clone()))
    }
}

impl NodeFactory for ReportStructureProvider {
    fn name(&self) -> &'static str {
        "report"
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn types(&self) -> &'static [&'static str] {
        &["reportSection", "playbook", "container", "procedure", "vulnerability"]
    }

    fn create_node(&self, item: &NodeJson) -> TreeResult<TreeNode> {
        let lang = &self.language;
        match item.node_type.as_str() {
            "reportSection" => Ok(container_node(item, ContainerVariant::ReportSection, lang)),
            "playbook" => Ok(container_node(item, ContainerVariant::Playbook, lang)),
            "container" => Ok(container_node(item, ContainerVariant::ProcedureSection, lang)),
            "procedure" => self.procedure(item),
            "vulnerability" => self.vulnerability(item),
            _ => Err(unknown(self.name(), item)),
        }
    }
}

/// Test-guide template structure: sections and template procedures.
pub struct TestGuideProvider {
    language: String,
    resolver: Box<dyn NameResolver>,
}

impl fmt::Debug for TestGuideProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestGuideProvider")
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

impl Default for TestGuideProvider {
    fn default() -> Self {
        Self::new("en")
    }
}

impl TestGuideProvider {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            resolver: Box::new(NoResolver),
        }
    }

    pub fn with_resolver(mut self, resolver: impl NameResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }
}

impl NodeFactory for TestGuideProvider {
    fn name(&self) -> &'static str {
        "test-guide"
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn types(&self) -> &'static [&'static str] {
        &["container", "procedure"]
    }

    fn create_node(&self, item: &NodeJson) -> TreeResult<TreeNode> {
        match item.node_type.as_str() {
            "container" => Ok(container_node(
                item,
                ContainerVariant::TemplateProcedureSection,
                &self.language,
            )),
            "procedure" => {
                ensure_childless(item)?;
                let procedure = TemplateProcedure {
                    template: field(item, "template")?,
                };
                let name = display_name(
                    item,
                    procedure.template.as_deref(),
                    &*self.resolver,
                    &self.language,
                );
                Ok(
                    TreeNode::leaf(&item.id, name, LeafVariant::TemplateProcedure(procedure))
                        .with_extra(item.extra.clone()),
                )
            }
            _ => Err(unknown(self.name(), item)),
        }
    }
}

/// Provider picked at runtime from configuration.
#[derive(Debug)]
pub enum AnyProvider {
    Generic(GenericProvider),
    Report(ReportStructureProvider),
    TestGuide(TestGuideProvider),
}

impl AnyProvider {
    pub fn from_kind(kind: ProviderKind, language: &str) -> Self {
        match kind {
            ProviderKind::Generic => Self::Generic(GenericProvider::new(language)),
            ProviderKind::Report => Self::Report(ReportStructureProvider::new(language)),
            ProviderKind::TestGuide => Self::TestGuide(TestGuideProvider::new(language)),
        }
    }

    fn inner(&self) -> &dyn NodeFactory {
        match self {
            Self::Generic(p) => p,
            Self::Report(p) => p,
            Self::TestGuide(p) => p,
        }
    }
}

impl NodeFactory for AnyProvider {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn types(&self) -> &'static [&'static str] {
        self.inner().types()
    }

    fn language(&self) -> &str {
        self.inner().language()
    }

    fn create_node(&self, item: &NodeJson) -> TreeResult<TreeNode> {
        self.inner().create_node(item)
    }
}
