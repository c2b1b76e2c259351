//! Compatibility rules for a partial build.
//!
//! [`evaluate`] is pure: it looks only at the selection it is given and
//! returns every rule violation, in rule order. An empty list means the
//! parts chosen so far fit together.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use super::catalog::{Component, ComponentKind, catalog, find_component};
use crate::Price;

/// Watts reserved for everything other than the CPU and GPU.
pub const BASELINE_WATTS: u32 = 100;

/// Errors resolving client-supplied component ids.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unknown component category: {0}")]
    UnknownKind(String),
    #[error("unknown {kind} component: {id}")]
    UnknownComponent { kind: ComponentKind, id: String },
}

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompatibilityIssue {
    /// CPU and motherboard sockets differ.
    SocketMismatch {
        cpu: Option<String>,
        motherboard: Option<String>,
    },
    /// CPU + GPU + baseline draw exceeds 80% of the PSU rating.
    InsufficientPower { system_watts: u32, psu_watts: u32 },
    /// The CPU draws more than the cooler is rated for.
    CoolerUnderrated { cpu_tdp: u32, cooler_tdp: u32 },
    /// Motherboard and case form factors differ.
    FormFactorMismatch {
        motherboard: Option<String>,
        case: Option<String>,
    },
}

impl CompatibilityIssue {
    /// Short machine-readable rule name.
    #[must_use]
    pub const fn rule(&self) -> &'static str {
        match self {
            Self::SocketMismatch { .. } => "socket",
            Self::InsufficientPower { .. } => "power",
            Self::CoolerUnderrated { .. } => "cooling",
            Self::FormFactorMismatch { .. } => "form_factor",
        }
    }
}

fn or_unknown(value: Option<&String>) -> &str {
    value.map_or("unknown", String::as_str)
}

impl fmt::Display for CompatibilityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SocketMismatch { cpu, motherboard } => write!(
                f,
                "CPU socket ({}) incompatible with motherboard ({})",
                or_unknown(cpu.as_ref()),
                or_unknown(motherboard.as_ref())
            ),
            Self::InsufficientPower {
                system_watts,
                psu_watts,
            } => write!(
                f,
                "PSU may be underpowered. System TDP: {system_watts}W, PSU: {psu_watts}W"
            ),
            Self::CoolerUnderrated {
                cpu_tdp,
                cooler_tdp,
            } => write!(
                f,
                "CPU cooler may not handle CPU TDP ({cpu_tdp}W vs {cooler_tdp}W)"
            ),
            Self::FormFactorMismatch { motherboard, case } => write!(
                f,
                "Motherboard form factor ({}) may not fit in case ({})",
                or_unknown(motherboard.as_ref()),
                or_unknown(case.as_ref())
            ),
        }
    }
}

impl Serialize for CompatibilityIssue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CompatibilityIssue", 2)?;
        state.serialize_field("rule", self.rule())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// A partial build: at most one component per slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSelection<'a> {
    parts: BTreeMap<ComponentKind, &'a Component>,
}

impl<'a> BuildSelection<'a> {
    /// An empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `component` in `kind`'s slot, replacing any previous choice.
    #[must_use]
    pub fn with(mut self, kind: ComponentKind, component: &'a Component) -> Self {
        self.parts.insert(kind, component);
        self
    }

    /// The component chosen for a slot, if any.
    #[must_use]
    pub fn get(&self, kind: ComponentKind) -> Option<&'a Component> {
        self.parts.get(&kind).copied()
    }

    /// Chosen components in display order.
    pub fn components(&self) -> impl Iterator<Item = (ComponentKind, &'a Component)> + '_ {
        self.parts.iter().map(|(kind, component)| (*kind, *component))
    }

    /// Number of filled slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether no slot is filled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Rule violations for this selection.
    #[must_use]
    pub fn issues(&self) -> Vec<CompatibilityIssue> {
        evaluate(self)
    }

    /// Price, completeness and compatibility of the selection.
    #[must_use]
    pub fn summary(&self) -> BuildSummary {
        let required_count = catalog().iter().filter(|c| c.required).count();
        let required_selected = self.parts.keys().filter(|kind| kind.is_required()).count();
        let issues = self.issues();

        BuildSummary {
            total_price: self.parts.values().map(|c| c.price).sum(),
            selected_count: self.parts.len(),
            required_selected,
            required_count,
            complete: required_selected == required_count,
            compatible: issues.is_empty(),
            issues,
        }
    }
}

impl BuildSelection<'static> {
    /// Resolve `{slot: component id}` against the catalog.
    ///
    /// Blank ids leave the slot empty.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownComponent`] for the first id that is
    /// not offered in its slot.
    pub fn resolve(ids: &BTreeMap<ComponentKind, String>) -> Result<Self, CatalogError> {
        let mut selection = Self::new();
        for (&kind, id) in ids {
            let id = id.trim();
            if id.is_empty() {
                continue;
            }
            let component =
                find_component(kind, id).ok_or_else(|| CatalogError::UnknownComponent {
                    kind,
                    id: id.to_owned(),
                })?;
            selection = selection.with(kind, component);
        }
        Ok(selection)
    }
}

/// What the builder reports for a selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub total_price: Price,
    pub selected_count: usize,
    pub required_selected: usize,
    pub required_count: usize,
    pub complete: bool,
    pub compatible: bool,
    pub issues: Vec<CompatibilityIssue>,
}

/// Check every rule against `selection`.
///
/// Rules only fire when all the slots they compare are filled, so an empty
/// or single-part selection is always compatible.
#[must_use]
pub fn evaluate(selection: &BuildSelection<'_>) -> Vec<CompatibilityIssue> {
    let cpu = selection.get(ComponentKind::Cpu);
    let motherboard = selection.get(ComponentKind::Motherboard);
    let gpu = selection.get(ComponentKind::Gpu);
    let psu = selection.get(ComponentKind::Psu);
    let cooler = selection.get(ComponentKind::Cooler);
    let case = selection.get(ComponentKind::Case);

    let mut issues = Vec::new();

    if let (Some(cpu), Some(motherboard)) = (cpu, motherboard)
        && cpu.socket != motherboard.socket
    {
        issues.push(CompatibilityIssue::SocketMismatch {
            cpu: cpu.socket.clone(),
            motherboard: motherboard.socket.clone(),
        });
    }

    if let (Some(cpu), Some(gpu), Some(psu)) = (cpu, gpu, psu) {
        let system_watts = cpu
            .tdp
            .unwrap_or(0)
            .saturating_add(gpu.tdp.unwrap_or(0))
            .saturating_add(BASELINE_WATTS);
        let psu_watts = psu.tdp.unwrap_or(0);

        // system > 0.8 * psu, kept in integers
        if u64::from(system_watts) * 10 > u64::from(psu_watts) * 8 {
            issues.push(CompatibilityIssue::InsufficientPower {
                system_watts,
                psu_watts,
            });
        }
    }

    // an unrated (zero) TDP on either side skips the check
    if let (Some(cpu_tdp), Some(cooler_tdp)) = (
        cpu.and_then(|c| c.tdp).filter(|w| *w > 0),
        cooler.and_then(|c| c.tdp).filter(|w| *w > 0),
    ) && cpu_tdp > cooler_tdp
    {
        issues.push(CompatibilityIssue::CoolerUnderrated {
            cpu_tdp,
            cooler_tdp,
        });
    }

    if let (Some(motherboard), Some(case)) = (motherboard, case)
        && motherboard.form_factor != case.form_factor
    {
        issues.push(CompatibilityIssue::FormFactorMismatch {
            motherboard: motherboard.form_factor.clone(),
            case: case.form_factor.clone(),
        });
    }

    issues
}
