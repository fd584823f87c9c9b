//! Rule validation and name resolution.
//!
//! One pass over a [`RuleSet`] checks every rule and, for rules that pass,
//! resolves names to interned ids. The compiler builds on the resolved
//! tables, so validation and compilation can never disagree.

use rustc_hash::{FxHashMap, FxHashSet};

use super::document::DocumentKind;
use super::error::{RuleIssue, RuleRef, RuleWarning, ValidationErrors};
use super::{RuleSet, ValidationMode};
use crate::core::constants::{
    DEFAULT_OPTIONAL_WEIGHT, DEFAULT_REQUIRED_WEIGHT, HIGH_CONVENTION_CONFIDENCE,
    IDENTITY_TRANSFORM, INLINE_CODE_KEYS, NUMERIC_RULE_CONFIDENCE, PATH_RULE_CONFIDENCE,
    PREFIX_RULE_CONFIDENCE, SHAPE_RULE_CONFIDENCE, SIGNATURE_HASH_LEN,
    SYNTHETIC_CONVENTION_PREFIX, UNKNOWN_FIELD_TYPE, VALUE_SET_CONFIDENCE,
};
use crate::domain::compile::{
    Classified, CompiledDerived, CompiledSignature, CompiledTransform, MappingTarget,
    NumericClass, PathClass, ShapeClass,
};
use crate::domain::detection::score;
use crate::domain::transforms::{TransformKind, TransformSpec, UnaryTransform};
use crate::domain::types::{ConventionId, FieldTypeId, Section, TransformId};
use crate::utils::crypto::{sha256_hex_parts, short_hex};
use crate::utils::string::{is_index_segment, path_prefixes, path_suffixes};

/// Weights may sum to 1 within floating point noise
const WEIGHT_EPSILON: f64 = 1e-9;

// =============================================================================
// Report
// =============================================================================

/// Outcome of validating a rule set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<RuleIssue>,
    pub warnings: Vec<RuleWarning>,
}

impl ValidationReport {
    pub fn is_valid(&self, mode: ValidationMode) -> bool {
        self.errors.is_empty() && (mode == ValidationMode::Permissive || self.warnings.is_empty())
    }

    /// Apply the mode: warnings are returned in permissive mode and become
    /// errors in strict mode.
    pub fn into_result(self, mode: ValidationMode) -> Result<Vec<RuleWarning>, ValidationErrors> {
        let mut errors = self.errors;
        match mode {
            ValidationMode::Permissive if errors.is_empty() => Ok(self.warnings),
            ValidationMode::Permissive => Err(ValidationErrors(errors)),
            ValidationMode::Strict => {
                errors.extend(self.warnings.into_iter().map(RuleIssue::Strict));
                if errors.is_empty() {
                    Ok(Vec::new())
                } else {
                    Err(ValidationErrors(errors))
                }
            }
        }
    }
}

/// Validate a rule set, reporting every issue.
pub fn validate(rules: &RuleSet) -> ValidationReport {
    resolve(rules).1
}

// =============================================================================
// Resolved Tables
// =============================================================================

/// Rule tables with every name resolved to an id
#[derive(Debug, Default)]
pub(crate) struct ResolvedRules {
    pub field_types: Vec<String>,
    pub field_type_ids: FxHashMap<String, FieldTypeId>,
    pub paths: FxHashMap<String, PathClass>,
    pub values: FxHashMap<String, Classified>,
    pub prefixes: Vec<(String, Classified)>,
    pub numeric: Vec<NumericClass>,
    pub shapes: Vec<ShapeClass>,
    pub signatures: Vec<CompiledSignature>,
    pub defaults: FxHashMap<FieldTypeId, MappingTarget>,
    pub overrides: FxHashMap<(ConventionId, FieldTypeId), MappingTarget>,
    pub derived: Vec<CompiledDerived>,
    pub transforms: Vec<CompiledTransform>,
}

pub(crate) fn resolve(rules: &RuleSet) -> (ResolvedRules, ValidationReport) {
    let mut resolver = Resolver::new(rules);
    resolver.check_required_kinds();
    resolver.field_types();
    resolver.transforms();
    resolver.classification();
    resolver.signatures();
    resolver.shadowed_signatures();
    resolver.mappings();
    resolver.usage_warnings();
    (resolver.out, resolver.report)
}

// =============================================================================
// Resolver
// =============================================================================

struct Resolver<'a> {
    rules: &'a RuleSet,
    out: ResolvedRules,
    report: ValidationReport,
    field_type_refs: Vec<Option<RuleRef>>,
    transform_refs: Vec<Option<RuleRef>>,
    transform_ids: FxHashMap<String, TransformId>,
    convention_ids: FxHashMap<String, ConventionId>,
    signature_refs: Vec<RuleRef>,
    produced_types: FxHashSet<FieldTypeId>,
    mapped_types: FxHashSet<FieldTypeId>,
    used_transforms: FxHashSet<TransformId>,
}

impl<'a> Resolver<'a> {
    fn new(rules: &'a RuleSet) -> Self {
        let mut out = ResolvedRules::default();
        out.field_types.push(UNKNOWN_FIELD_TYPE.to_string());
        out.field_type_ids
            .insert(UNKNOWN_FIELD_TYPE.to_string(), FieldTypeId::UNKNOWN);
        out.transforms.push(CompiledTransform {
            name: IDENTITY_TRANSFORM.to_string(),
            spec: TransformSpec::Unary(UnaryTransform::Identity),
        });

        let mut transform_ids = FxHashMap::default();
        transform_ids.insert(IDENTITY_TRANSFORM.to_string(), TransformId::IDENTITY);

        Self {
            rules,
            out,
            report: ValidationReport::default(),
            field_type_refs: vec![None],
            transform_refs: vec![None],
            transform_ids,
            convention_ids: FxHashMap::default(),
            signature_refs: Vec::new(),
            produced_types: FxHashSet::default(),
            mapped_types: FxHashSet::default(),
            used_transforms: FxHashSet::default(),
        }
    }

    fn error(&mut self, issue: RuleIssue) {
        self.report.errors.push(issue);
    }

    fn warn(&mut self, warning: RuleWarning) {
        self.report.warnings.push(warning);
    }

    fn check_required_kinds(&mut self) {
        for kind in DocumentKind::ALL {
            if kind.is_required()
                && self.rules.document_count(kind) == 0
                && self.rules.is_complete(kind)
            {
                self.error(RuleIssue::MissingKind {
                    kind: kind.as_str().to_string(),
                });
            }
        }
    }

    // -------------------------------------------------------------------------
    // Shared checks
    // -------------------------------------------------------------------------

    /// Resolve a field type referenced by a rule. `unknown` resolves to the
    /// reserved id; callers decide whether that is allowed.
    fn type_id(&mut self, rule: &RuleRef, name: &str) -> Option<FieldTypeId> {
        if let Some(id) = self.out.field_type_ids.get(name) {
            return Some(*id);
        }
        if self.rules.is_complete(DocumentKind::Classification) {
            self.error(RuleIssue::UndeclaredFieldType {
                rule: rule.clone(),
                field_type: name.to_string(),
            });
        }
        None
    }

    /// Resolve a field type that a classification rule assigns
    fn assigned_type(&mut self, rule: &RuleRef, name: &str) -> Option<FieldTypeId> {
        if name == UNKNOWN_FIELD_TYPE {
            self.error(RuleIssue::ReservedFieldType {
                rule: rule.clone(),
                field_type: name.to_string(),
            });
            return None;
        }
        let id = self.type_id(rule, name)?;
        self.produced_types.insert(id);
        Some(id)
    }

    fn confidence(&mut self, rule: &RuleRef, value: Option<f64>, default: f64) -> Option<f64> {
        match value {
            None => Some(default),
            Some(v) if (0.0..=1.0).contains(&v) => Some(v),
            Some(v) => {
                self.error(RuleIssue::ConfidenceOutOfRange {
                    rule: rule.clone(),
                    value: v,
                });
                None
            }
        }
    }

    fn classified(
        &mut self,
        rule: &RuleRef,
        field_type: &str,
        confidence: Option<f64>,
        default: f64,
    ) -> Option<Classified> {
        let field_type = self.assigned_type(rule, field_type);
        let confidence = self.confidence(rule, confidence, default);
        Some(Classified {
            field_type: field_type?,
            confidence: confidence?,
        })
    }

    fn invalid(&mut self, rule: &RuleRef, reason: impl Into<String>) {
        self.error(RuleIssue::InvalidRule {
            rule: rule.clone(),
            reason: reason.into(),
        });
    }

    /// Resolve a transform name and check its kind
    fn transform_id(
        &mut self,
        rule: &RuleRef,
        name: &str,
        expected: TransformKind,
    ) -> Option<TransformId> {
        let Some(id) = self.transform_ids.get(name).copied() else {
            if self.rules.is_complete(DocumentKind::Transforms) {
                self.error(RuleIssue::UndeclaredTransform {
                    rule: rule.clone(),
                    transform: name.to_string(),
                });
            }
            return None;
        };
        self.used_transforms.insert(id);
        let actual = self.out.transforms[id.index()].spec.kind();
        if actual != expected {
            self.error(RuleIssue::TransformKindMismatch {
                rule: rule.clone(),
                transform: name.to_string(),
                actual: actual.to_string(),
                expected: expected.to_string(),
            });
            return None;
        }
        Some(id)
    }

    fn target(&mut self, rule: &RuleRef, target: &str) -> Option<(Section, String)> {
        match parse_target(target) {
            Ok(parsed) => Some(parsed),
            Err(reason) => {
                self.error(RuleIssue::InvalidTarget {
                    rule: rule.clone(),
                    target: target.to_string(),
                    reason,
                });
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Field types
    // -------------------------------------------------------------------------

    fn field_types(&mut self) {
        let rules = self.rules;
        for doc in &rules.classification {
            for (index, name) in doc.document.field_types.iter().enumerate() {
                let rule = RuleRef::new(&doc.file, "field_types", index, name.as_str());
                if name.trim().is_empty() {
                    self.invalid(&rule, "field type name is empty");
                    continue;
                }
                if name == UNKNOWN_FIELD_TYPE {
                    self.error(RuleIssue::ReservedFieldType {
                        rule,
                        field_type: name.clone(),
                    });
                    continue;
                }
                if self.out.field_type_ids.contains_key(name) {
                    self.error(RuleIssue::DuplicateFieldType {
                        rule,
                        field_type: name.clone(),
                    });
                    continue;
                }
                let Ok(raw) = u16::try_from(self.out.field_types.len()) else {
                    self.invalid(&rule, "too many field types");
                    continue;
                };
                self.out.field_types.push(name.clone());
                self.out.field_type_ids.insert(name.clone(), FieldTypeId(raw));
                self.field_type_refs.push(Some(rule));
            }
        }
    }

    // -------------------------------------------------------------------------
    // Transforms
    // -------------------------------------------------------------------------

    fn transforms(&mut self) {
        let rules = self.rules;
        for doc in &rules.transforms {
            for (index, def) in doc.document.transforms.iter().enumerate() {
                let label = format!("{} = {}", def.name, def.function);
                let rule = RuleRef::new(&doc.file, "transforms", index, label);

                for key in def.extra.keys() {
                    if INLINE_CODE_KEYS.contains(&key.as_str()) {
                        self.error(RuleIssue::InlineCode {
                            rule: rule.clone(),
                            field: key.clone(),
                        });
                    } else {
                        self.error(RuleIssue::UnexpectedField {
                            rule: rule.clone(),
                            field: key.clone(),
                        });
                    }
                }

                if def.name.trim().is_empty() {
                    self.invalid(&rule, "transform name is empty");
                    continue;
                }
                let spec = match TransformSpec::resolve(&def.function, &def.params) {
                    Ok(spec) => spec,
                    Err(source) => {
                        self.error(RuleIssue::InvalidTransform { rule, source });
                        continue;
                    }
                };
                if def.name == IDENTITY_TRANSFORM {
                    if spec != TransformSpec::Unary(UnaryTransform::Identity) {
                        self.invalid(&rule, "'identity' is reserved for the pass-through transform");
                    }
                    continue;
                }
                if self.transform_ids.contains_key(&def.name) {
                    self.error(RuleIssue::DuplicateTransform {
                        rule,
                        name: def.name.clone(),
                    });
                    continue;
                }
                let Ok(raw) = u16::try_from(self.out.transforms.len()) else {
                    self.invalid(&rule, "too many transforms");
                    continue;
                };
                self.transform_ids.insert(def.name.clone(), TransformId(raw));
                self.out.transforms.push(CompiledTransform {
                    name: def.name.clone(),
                    spec,
                });
                self.transform_refs.push(Some(rule));
            }
        }
    }

    // -------------------------------------------------------------------------
    // Classification
    // -------------------------------------------------------------------------

    fn classification(&mut self) {
        let rules = self.rules;
        let mut path_refs: FxHashMap<String, RuleRef> = FxHashMap::default();

        for doc in &rules.classification {
            let file = doc.file.as_str();
            let document = &doc.document;

            for (index, r) in document.path_rules.iter().enumerate() {
                let rule = RuleRef::new(file, "path_rules", index, format!("{} -> {}", r.path, r.field_type));
                let path = r.path.trim();
                if let Err(reason) = check_dotted(path) {
                    self.invalid(&rule, format!("path {reason}"));
                    continue;
                }
                if path.split('.').any(is_index_segment) {
                    self.invalid(&rule, "path must not contain list indices");
                    continue;
                }
                let Some(class) = self.classified(&rule, &r.field_type, r.confidence, PATH_RULE_CONFIDENCE) else {
                    continue;
                };
                if let Some(first) = path_refs.get(path) {
                    self.error(RuleIssue::DuplicatePathRule {
                        rule,
                        path: path.to_string(),
                        first: first.clone(),
                    });
                    continue;
                }
                path_refs.insert(path.to_string(), rule);
                self.out.paths.insert(
                    path.to_string(),
                    PathClass {
                        class,
                        capture: r.capture,
                    },
                );
            }

            for (index, r) in document.value_sets.iter().enumerate() {
                let rule = RuleRef::new(file, "value_sets", index, r.field_type.as_str());
                if r.values.is_empty() {
                    self.invalid(&rule, "value set is empty");
                    continue;
                }
                let Some(class) = self.classified(&rule, &r.field_type, r.confidence, VALUE_SET_CONFIDENCE) else {
                    continue;
                };
                for value in &r.values {
                    let token = value.trim().to_lowercase();
                    if token.is_empty() {
                        self.invalid(&rule, "value set contains an empty token");
                        continue;
                    }
                    match self.out.values.get(&token) {
                        Some(existing) if existing.field_type != class.field_type => {
                            let existing = self.out.field_types[existing.field_type.index()].clone();
                            self.error(RuleIssue::AmbiguousValue {
                                rule: rule.clone(),
                                value: value.clone(),
                                existing,
                            });
                        }
                        Some(_) => {}
                        None => {
                            self.out.values.insert(token, class);
                        }
                    }
                }
            }

            for (index, r) in document.prefix_rules.iter().enumerate() {
                let rule = RuleRef::new(file, "prefix_rules", index, r.field_type.as_str());
                if r.prefixes.is_empty() {
                    self.invalid(&rule, "prefix list is empty");
                    continue;
                }
                let Some(class) = self.classified(&rule, &r.field_type, r.confidence, PREFIX_RULE_CONFIDENCE) else {
                    continue;
                };
                for prefix in &r.prefixes {
                    if prefix.is_empty() {
                        self.invalid(&rule, "prefix list contains an empty prefix");
                        continue;
                    }
                    self.out.prefixes.push((prefix.to_lowercase(), class));
                }
            }

            for (index, r) in document.numeric_rules.iter().enumerate() {
                let rule = RuleRef::new(file, "numeric_rules", index, r.field_type.as_str());
                if r.min.is_none() && r.max.is_none() && r.integer.is_none() {
                    self.invalid(&rule, "numeric rule needs at least one of min, max or integer");
                    continue;
                }
                if r.min.is_some_and(|v| !v.is_finite()) || r.max.is_some_and(|v| !v.is_finite()) {
                    self.invalid(&rule, "numeric bounds must be finite");
                    continue;
                }
                if let (Some(min), Some(max)) = (r.min, r.max)
                    && min > max
                {
                    self.invalid(&rule, format!("min {min} is greater than max {max}"));
                    continue;
                }
                let Some(class) = self.classified(&rule, &r.field_type, r.confidence, NUMERIC_RULE_CONFIDENCE) else {
                    continue;
                };
                self.out.numeric.push(NumericClass {
                    min: r.min,
                    max: r.max,
                    integer: r.integer,
                    class,
                });
            }

            for (index, r) in document.shape_rules.iter().enumerate() {
                let rule = RuleRef::new(file, "shape_rules", index, format!("{} @ {}", r.field_type, r.key));
                if r.required_keys.is_empty() || r.required_keys.iter().any(String::is_empty) {
                    self.invalid(&rule, "required_keys must be non-empty");
                    continue;
                }
                if r.key.is_empty() {
                    self.invalid(&rule, "key is empty");
                    continue;
                }
                let Some(class) = self.classified(&rule, &r.field_type, r.confidence, SHAPE_RULE_CONFIDENCE) else {
                    continue;
                };
                self.out.shapes.push(ShapeClass {
                    required_keys: r.required_keys.clone(),
                    key: r.key.clone(),
                    class,
                });
            }
        }
    }

    // -------------------------------------------------------------------------
    // Signatures
    // -------------------------------------------------------------------------

    fn signatures(&mut self) {
        let rules = self.rules;
        for doc in &rules.signatures {
            for (index, sig) in doc.document.conventions.iter().enumerate() {
                let rule = RuleRef::new(&doc.file, "conventions", index, sig.name.as_str());
                let name = sig.name.trim();
                if name.is_empty() {
                    self.invalid(&rule, "convention name is empty");
                    continue;
                }
                if name.starts_with(SYNTHETIC_CONVENTION_PREFIX) {
                    self.invalid(
                        &rule,
                        format!("names starting with '{SYNTHETIC_CONVENTION_PREFIX}' are reserved for synthetic conventions"),
                    );
                    continue;
                }
                if self.convention_ids.contains_key(name) {
                    self.error(RuleIssue::DuplicateConvention {
                        rule,
                        name: name.to_string(),
                    });
                    continue;
                }

                if let Err(reason) = check_signature_fields(&sig.required, &sig.optional) {
                    self.error(RuleIssue::MalformedSignature { rule, reason });
                    continue;
                }
                if let Some(reason) = self.captured_signature_field(&sig.required, &sig.optional) {
                    self.error(RuleIssue::MalformedSignature { rule, reason });
                    continue;
                }

                let (required_weight, optional_weight) = sig
                    .weights
                    .map(|w| (w.required, w.optional))
                    .unwrap_or((DEFAULT_REQUIRED_WEIGHT, DEFAULT_OPTIONAL_WEIGHT));
                if let Err(reason) = check_weights(required_weight, optional_weight) {
                    self.error(RuleIssue::MalformedSignature { rule, reason });
                    continue;
                }

                let Ok(raw) = u16::try_from(self.out.signatures.len()) else {
                    self.invalid(&rule, "too many conventions");
                    continue;
                };
                self.convention_ids.insert(name.to_string(), ConventionId(raw));
                self.signature_refs.push(rule);
                self.out.signatures.push(CompiledSignature {
                    hash: signature_hash(name, &sig.required, &sig.optional),
                    name: name.to_string(),
                    required: sig.required.clone(),
                    optional: sig.optional.clone(),
                    required_weight,
                    optional_weight,
                });
            }
        }
    }

    /// Fields below a captured container never reach detection
    fn captured_signature_field(&self, required: &[String], optional: &[String]) -> Option<String> {
        required.iter().chain(optional).find_map(|field| {
            path_prefixes(field)
                .take_while(|prefix| prefix.len() < field.len())
                .find(|prefix| {
                    path_suffixes(prefix).any(|suffix| self.out.paths.get(suffix).is_some_and(|p| p.capture))
                })
                .map(|prefix| format!("field '{field}' sits under captured path '{prefix}'"))
        })
    }

    /// A record carrying only a convention's required fields, flat or
    /// nested, must be detected as that convention.
    fn shadowed_signatures(&mut self) {
        let signatures = &self.out.signatures;
        let mut shadowed = Vec::new();

        for (idx, signature) in signatures.iter().enumerate() {
            let flat: FxHashSet<String> = signature.required.iter().cloned().collect();
            let nested: FxHashSet<String> = signature
                .required
                .iter()
                .flat_map(|field| path_prefixes(field))
                .map(str::to_string)
                .collect();

            for paths in [&flat, &nested] {
                let (own, _) = score(signature, paths);
                let winner = signatures.iter().enumerate().find(|&(other, candidate)| {
                    let (confidence, _) = score(candidate, paths);
                    other != idx && (confidence > own || (confidence == own && other < idx))
                });
                if let Some((_, winner)) = winner {
                    shadowed.push((idx, winner.name.clone()));
                    break;
                }
            }
        }

        for (idx, by) in shadowed {
            let rule = self.signature_refs[idx].clone();
            self.error(RuleIssue::ShadowedSignature { rule, by });
        }
    }

    // -------------------------------------------------------------------------
    // Mappings
    // -------------------------------------------------------------------------

    fn mappings(&mut self) {
        let rules = self.rules;
        let mut mapping_refs: FxHashMap<(Option<ConventionId>, FieldTypeId), RuleRef> =
            FxHashMap::default();

        for doc in &rules.mappings {
            let file = doc.file.as_str();
            for (index, m) in doc.document.mappings.iter().enumerate() {
                let label = match &m.convention {
                    Some(conv) => format!("{conv}/{} -> {}", m.field_type, m.target),
                    None => format!("{} -> {}", m.field_type, m.target),
                };
                let rule = RuleRef::new(file, "mappings", index, label);

                let field_type = self.type_id(&rule, &m.field_type);
                if field_type == Some(FieldTypeId::UNKNOWN) {
                    self.warn(RuleWarning::UnknownTypeMapped { rule: rule.clone() });
                }
                let convention = match &m.convention {
                    None => Some(None),
                    Some(name) => match self.convention_ids.get(name.as_str()) {
                        Some(id) => Some(Some(*id)),
                        None => {
                            if self.rules.is_complete(DocumentKind::Signatures) {
                                self.error(RuleIssue::UnknownConvention {
                                    rule: rule.clone(),
                                    convention: name.clone(),
                                });
                            }
                            None
                        }
                    },
                };
                let target = self.target(&rule, &m.target);
                let transform = match &m.transform {
                    None => Some(TransformId::IDENTITY),
                    Some(name) => self.transform_id(&rule, name, TransformKind::Unary),
                };

                let (Some(field_type), Some(convention), Some((section, field)), Some(transform)) =
                    (field_type, convention, target, transform)
                else {
                    continue;
                };

                let key = (convention, field_type);
                if let Some(first) = mapping_refs.get(&key) {
                    let key = match &m.convention {
                        Some(conv) => format!("({conv}, {})", m.field_type),
                        None => format!("'{}'", m.field_type),
                    };
                    self.error(RuleIssue::DuplicateMapping {
                        rule,
                        key,
                        first: first.clone(),
                    });
                    continue;
                }
                mapping_refs.insert(key, rule);
                self.mapped_types.insert(field_type);

                let target = MappingTarget {
                    section,
                    field,
                    transform,
                    collect: m.collect,
                };
                match convention {
                    None => {
                        self.out.defaults.insert(field_type, target);
                    }
                    Some(conv) => {
                        self.out.overrides.insert((conv, field_type), target);
                    }
                }
            }

            for (index, d) in doc.document.derived.iter().enumerate() {
                let rule = RuleRef::new(file, "derived", index, format!("{} <- {}", d.target, d.aggregate));
                let target = self.target(&rule, &d.target);
                let aggregate = self.transform_id(&rule, &d.aggregate, TransformKind::Aggregate);
                if d.sources.is_empty() {
                    self.invalid(&rule, "derived rule has no sources");
                    continue;
                }
                let sources: Vec<Option<FieldTypeId>> =
                    d.sources.iter().map(|s| self.type_id(&rule, s)).collect();
                let unless_present = match &d.unless_present {
                    None => Some(None),
                    Some(name) => self.type_id(&rule, name).map(Some),
                };

                let (Some((section, field)), Some(aggregate), Some(unless_present)) =
                    (target, aggregate, unless_present)
                else {
                    continue;
                };
                let Some(sources) = sources.into_iter().collect::<Option<Vec<_>>>() else {
                    continue;
                };
                let TransformSpec::Aggregate(aggregate) = self.out.transforms[aggregate.index()].spec
                else {
                    continue;
                };
                self.out.derived.push(CompiledDerived {
                    section,
                    field,
                    aggregate,
                    sources,
                    unless_present,
                });
            }
        }
    }

    // -------------------------------------------------------------------------
    // Warnings
    // -------------------------------------------------------------------------

    fn usage_warnings(&mut self) {
        if self.rules.is_complete(DocumentKind::Mappings) {
            for (idx, rule) in self.transform_refs.iter().enumerate() {
                let Some(rule) = rule else { continue };
                if !self.used_transforms.contains(&TransformId(idx as u16)) {
                    self.report.warnings.push(RuleWarning::UnusedTransform {
                        rule: rule.clone(),
                        name: self.out.transforms[idx].name.clone(),
                    });
                }
            }
        }

        for (idx, rule) in self.field_type_refs.iter().enumerate() {
            let Some(rule) = rule else { continue };
            let id = FieldTypeId(idx as u16);
            let field_type = &self.out.field_types[idx];
            if !self.produced_types.contains(&id) {
                self.report.warnings.push(RuleWarning::UnclassifiedFieldType {
                    rule: rule.clone(),
                    field_type: field_type.clone(),
                });
            }
            if !self.mapped_types.contains(&id) && self.rules.is_complete(DocumentKind::Mappings) {
                self.report.warnings.push(RuleWarning::UnmappedFieldType {
                    rule: rule.clone(),
                    field_type: field_type.clone(),
                });
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Split `section.field.path` into its section and dotted field
pub(crate) fn parse_target(target: &str) -> Result<(Section, String), String> {
    let Some((section, field)) = target.split_once('.') else {
        return Err("expected '<section>.<field>'".to_string());
    };
    let Some(section) = Section::parse(section) else {
        return Err(format!(
            "unknown section '{section}' (expected inputs, outputs, config or metadata)"
        ));
    };
    check_dotted(field).map_err(|reason| format!("field {reason}"))?;
    Ok((section, field.to_string()))
}

fn check_dotted(path: &str) -> Result<(), &'static str> {
    if path.is_empty() {
        return Err("is empty");
    }
    if path.split('.').any(str::is_empty) {
        return Err("has an empty segment");
    }
    Ok(())
}

fn check_signature_fields(required: &[String], optional: &[String]) -> Result<(), String> {
    if required.is_empty() {
        return Err("required field set is empty".to_string());
    }
    let mut seen = FxHashSet::default();
    for field in required.iter().chain(optional) {
        check_dotted(field).map_err(|reason| format!("field '{field}' {reason}"))?;
        if field.split('.').any(is_index_segment) {
            return Err(format!("field '{field}' must not contain list indices"));
        }
        if !seen.insert(field.as_str()) {
            return Err(if required.contains(field) && optional.contains(field) {
                format!("field '{field}' is both required and optional")
            } else {
                format!("field '{field}' is listed twice")
            });
        }
    }
    Ok(())
}

fn check_weights(required: f64, optional: f64) -> Result<(), String> {
    if !(0.0..=1.0).contains(&required) || !(0.0..=1.0).contains(&optional) {
        return Err(format!("weights ({required}, {optional}) must be within [0, 1]"));
    }
    if required + optional > 1.0 + WEIGHT_EPSILON {
        return Err(format!("weights ({required}, {optional}) sum above 1"));
    }
    // A record carrying every required field must reach high confidence
    if required < HIGH_CONVENTION_CONFIDENCE {
        return Err(format!(
            "required weight {required} is below {HIGH_CONVENTION_CONFIDENCE}"
        ));
    }
    Ok(())
}

fn signature_hash(name: &str, required: &[String], optional: &[String]) -> String {
    let mut required: Vec<&str> = required.iter().map(String::as_str).collect();
    let mut optional: Vec<&str> = optional.iter().map(String::as_str).collect();
    required.sort_unstable();
    optional.sort_unstable();
    let parts = std::iter::once(name)
        .chain(std::iter::once("required"))
        .chain(required)
        .chain(std::iter::once("optional"))
        .chain(optional);
    short_hex(&sha256_hex_parts(parts), SIGNATURE_HASH_LEN).to_string()
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
