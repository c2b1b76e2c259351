//! The static builder catalog.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::Price;

/// A slot in a PC build.
///
/// Declaration order is display order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Cpu,
    Motherboard,
    Gpu,
    Ram,
    Storage,
    Case,
    Psu,
    Cooler,
}

impl ComponentKind {
    /// Every slot, in display order.
    pub const ALL: [Self; 8] = [
        Self::Cpu,
        Self::Motherboard,
        Self::Gpu,
        Self::Ram,
        Self::Storage,
        Self::Case,
        Self::Psu,
        Self::Cooler,
    ];

    /// The wire name of the slot.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Motherboard => "motherboard",
            Self::Gpu => "gpu",
            Self::Ram => "ram",
            Self::Storage => "storage",
            Self::Case => "case",
            Self::Psu => "psu",
            Self::Cooler => "cooler",
        }
    }

    /// Human-readable slot name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Cpu => "Processor",
            Self::Motherboard => "Motherboard",
            Self::Gpu => "Graphics Card",
            Self::Ram => "Memory",
            Self::Storage => "Storage",
            Self::Case => "Case",
            Self::Psu => "Power Supply",
            Self::Cooler => "CPU Cooler",
        }
    }

    /// Whether a build is incomplete without this slot.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        !matches!(self, Self::Cooler)
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ComponentKind {
    type Err = super::CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| super::CatalogError::UnknownKind(s.to_owned()))
    }
}

/// One purchasable builder part.
///
/// `tdp` is the power draw for CPUs and GPUs, the cooling capacity for
/// coolers, and the rated output for power supplies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub price: Price,
    pub specs: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tdp: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_factor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Component {
    fn new(id: &str, name: &str, brand: &str, dollars: i64, specs: &str) -> Self {
        Self {
            id: id.to_owned(),
            name: name.to_owned(),
            brand: brand.to_owned(),
            price: Price::from_dollars(dollars),
            specs: specs.to_owned(),
            socket: None,
            tdp: None,
            form_factor: None,
            image_url: None,
        }
    }

    fn socket(mut self, socket: &str) -> Self {
        self.socket = Some(socket.to_owned());
        self
    }

    fn tdp(mut self, watts: u32) -> Self {
        self.tdp = Some(watts);
        self
    }

    fn form_factor(mut self, form_factor: &str) -> Self {
        self.form_factor = Some(form_factor.to_owned());
        self
    }
}

/// A slot with its display metadata and the parts offered for it.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentCategory {
    pub kind: ComponentKind,
    pub name: &'static str,
    pub required: bool,
    pub items: Vec<Component>,
}

impl ComponentCategory {
    fn new(kind: ComponentKind, items: Vec<Component>) -> Self {
        Self {
            kind,
            name: kind.display_name(),
            required: kind.is_required(),
            items,
        }
    }
}

static CATALOG: LazyLock<Vec<ComponentCategory>> = LazyLock::new(|| {
    use ComponentKind as K;

    vec![
        ComponentCategory::new(
            K::Cpu,
            vec![
                Component::new("cpu1", "Intel Core i9-14900K", "Intel", 589, "24 cores, 5.8GHz boost")
                    .socket("LGA1700")
                    .tdp(125),
                Component::new("cpu2", "AMD Ryzen 9 7950X", "AMD", 549, "16 cores, 5.7GHz boost")
                    .socket("AM5")
                    .tdp(170),
                Component::new("cpu3", "Intel Core i7-14700K", "Intel", 409, "20 cores, 5.6GHz boost")
                    .socket("LGA1700")
                    .tdp(125),
                Component::new("cpu4", "AMD Ryzen 7 7800X3D", "AMD", 449, "8 cores, 96MB cache")
                    .socket("AM5")
                    .tdp(120),
            ],
        ),
        ComponentCategory::new(
            K::Motherboard,
            vec![
                Component::new("mb1", "ASUS ROG STRIX Z790-E", "ASUS", 499, "DDR5, WiFi 6E")
                    .socket("LGA1700")
                    .form_factor("ATX"),
                Component::new("mb2", "MSI MPG X670E", "MSI", 449, "DDR5, PCIe 5.0")
                    .socket("AM5")
                    .form_factor("ATX"),
                Component::new("mb3", "Gigabyte Z790 AORUS", "Gigabyte", 379, "DDR5, WiFi 6")
                    .socket("LGA1700")
                    .form_factor("ATX"),
                Component::new("mb4", "ASRock B650E Steel Legend", "ASRock", 299, "DDR5, PCIe 5.0")
                    .socket("AM5")
                    .form_factor("ATX"),
            ],
        ),
        ComponentCategory::new(
            K::Gpu,
            vec![
                Component::new("gpu1", "RTX 4090", "NVIDIA", 1599, "24GB GDDR6X").tdp(450),
                Component::new("gpu2", "RTX 4080 Super", "NVIDIA", 999, "16GB GDDR6X").tdp(320),
                Component::new("gpu3", "RX 7900 XTX", "AMD", 899, "24GB GDDR6").tdp(355),
                Component::new("gpu4", "RTX 4070 Ti Super", "NVIDIA", 799, "16GB GDDR6X").tdp(285),
            ],
        ),
        ComponentCategory::new(
            K::Ram,
            vec![
                Component::new("ram1", "Corsair Vengeance", "Corsair", 189, "32GB DDR5-6000"),
                Component::new("ram2", "G.Skill Trident Z5", "G.Skill", 159, "32GB DDR5-5600"),
                Component::new("ram3", "Kingston Fury Beast", "Kingston", 139, "32GB DDR5-5200"),
                Component::new("ram4", "Corsair Dominator", "Corsair", 249, "32GB DDR5-6400"),
            ],
        ),
        ComponentCategory::new(
            K::Storage,
            vec![
                Component::new("ssd1", "Samsung 990 Pro", "Samsung", 159, "2TB NVMe, 7450MB/s"),
                Component::new("ssd2", "WD Black SN850X", "Western Digital", 179, "2TB NVMe, 7300MB/s"),
                Component::new("ssd3", "Crucial T700", "Crucial", 199, "2TB NVMe, 12400MB/s"),
                Component::new("ssd4", "Samsung 980 Pro", "Samsung", 129, "1TB NVMe, 7000MB/s"),
            ],
        ),
        ComponentCategory::new(
            K::Case,
            vec![
                Component::new("case1", "NZXT H9 Elite", "NZXT", 169, "Mid-tower, tempered glass")
                    .form_factor("ATX"),
                Component::new("case2", "Lian Li O11 Dynamic", "Lian Li", 159, "Mid-tower, dual chamber")
                    .form_factor("ATX"),
                Component::new("case3", "Fractal Torrent", "Fractal", 189, "Mid-tower, high airflow")
                    .form_factor("ATX"),
                Component::new("case4", "Corsair 5000D", "Corsair", 149, "Mid-tower, cable management")
                    .form_factor("ATX"),
            ],
        ),
        ComponentCategory::new(
            K::Psu,
            vec![
                Component::new("psu1", "Corsair RM1000x", "Corsair", 179, "1000W, 80+ Gold").tdp(1000),
                Component::new("psu2", "Seasonic Prime TX", "Seasonic", 249, "1000W, 80+ Titanium")
                    .tdp(1000),
                Component::new("psu3", "EVGA SuperNOVA", "EVGA", 159, "850W, 80+ Gold").tdp(850),
                Component::new("psu4", "be quiet! Dark Power", "be quiet!", 199, "850W, 80+ Platinum")
                    .tdp(850),
            ],
        ),
        ComponentCategory::new(
            K::Cooler,
            vec![
                Component::new("cool1", "Noctua NH-D15", "Noctua", 109, "Dual tower, 140mm fans").tdp(250),
                Component::new("cool2", "Corsair H150i Elite", "Corsair", 189, "360mm AIO, RGB").tdp(300),
                Component::new("cool3", "Arctic Liquid Freezer II", "Arctic", 139, "280mm AIO").tdp(280),
                Component::new("cool4", "be quiet! Dark Rock Pro 4", "be quiet!", 89, "Dual tower, silent")
                    .tdp(250),
            ],
        ),
    ]
});

/// All categories in display order.
#[must_use]
pub fn catalog() -> &'static [ComponentCategory] {
    &CATALOG
}

/// Look up a component within one slot.
#[must_use]
pub fn find_component(kind: ComponentKind, id: &str) -> Option<&'static Component> {
    catalog()
        .iter()
        .find(|category| category.kind == kind)
        .and_then(|category| category.items.iter().find(|item| item.id == id))
}

/// Look up a component by id alone, returning its slot.
///
/// Component ids are unique across the catalog.
#[must_use]
pub fn component_by_id(id: &str) -> Option<(ComponentKind, &'static Component)> {
    catalog().iter().find_map(|category| {
        category
            .items
            .iter()
            .find(|item| item.id == id)
            .map(|item| (category.kind, item))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_catalog_shape() {
        let categories = catalog();
        assert_eq!(categories.len(), 8);

        for (category, kind) in categories.iter().zip(ComponentKind::ALL) {
            assert_eq!(category.kind, kind);
            assert_eq!(category.items.len(), 4);
        }

        let required = categories.iter().filter(|c| c.required).count();
        assert_eq!(required, 7);
    }

    #[test]
    fn test_component_ids_are_unique() {
        let ids: Vec<&str> = catalog()
            .iter()
            .flat_map(|c| c.items.iter().map(|i| i.id.as_str()))
            .collect();
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len());
    }

    #[test]
    fn test_find_component() {
        let cpu = find_component(ComponentKind::Cpu, "cpu2").unwrap();
        assert_eq!(cpu.name, "AMD Ryzen 9 7950X");
        assert_eq!(cpu.socket.as_deref(), Some("AM5"));

        assert!(find_component(ComponentKind::Gpu, "cpu2").is_none());
        assert!(find_component(ComponentKind::Gpu, "gpu9").is_none());
    }

    #[test]
    fn test_component_by_id() {
        let (kind, cooler) = component_by_id("cool4").unwrap();
        assert_eq!(kind, ComponentKind::Cooler);
        assert_eq!(cooler.brand, "be quiet!");
        assert!(component_by_id("nope").is_none());
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("psu".parse::<ComponentKind>().unwrap(), ComponentKind::Psu);
        assert!("fan".parse::<ComponentKind>().is_err());
    }
}
