//! Settings: where files live, how the template is laid out, and the
//! business tables (suppliers, price profiles, repricing properties).
//!
//! Everything has a default matching the production template, so an empty
//! `dealsheets.toml` (or none at all) is a valid configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use dealsheets_core::CellAddress;

/// File looked up in the working directory when no path is given
pub const CONFIG_FILE: &str = "dealsheets.toml";

/// Environment variable overriding `webhook_url`
pub const WEBHOOK_ENV: &str = "DEALSHEETS_WEBHOOK_URL";

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Inbound webhook, e.g. `https://portal.bitrix24.ru/rest/1/secret/`
    pub webhook_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Calculation template copied for every deal
    pub template_path: PathBuf,
    /// Root folder of per-deal output folders
    pub output_dir: PathBuf,
    pub layout: TemplateLayout,
    pub enrich: EnrichSettings,
    /// Supplier details by the catalog's supplier list value
    pub suppliers: BTreeMap<String, SupplierInfo>,
    pub fallback_supplier: FallbackSupplier,
    pub price_profiles: Vec<PriceProfile>,
    pub reprice: RepriceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let mut suppliers = BTreeMap::new();
        suppliers.insert(
            "ООО".to_string(),
            SupplierInfo {
                name: "ООО \"Научные развлечения\"".into(),
                vat_in: "НДС 20%".into(),
                city: "Москва".into(),
            },
        );

        Self {
            webhook_url: String::new(),
            timeout_secs: 30,
            template_path: PathBuf::from("Шаблоны").join("Расчет_шаблон_V1.xlsx"),
            output_dir: PathBuf::from("Расчеты"),
            layout: TemplateLayout::default(),
            enrich: EnrichSettings::default(),
            suppliers,
            fallback_supplier: FallbackSupplier::default(),
            price_profiles: vec![
                PriceProfile::new("КЕДО", "X", "0.00", "N"),
                PriceProfile::new("Верш", "W", "0.00", "N"),
                PriceProfile::new("ЛШО", "V", "20.00", "Y"),
            ],
            reprice: RepriceSettings::default(),
        }
    }
}

/// Cell coordinates of the calculation template
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateLayout {
    pub calculator: CalculatorLayout,
    pub shipping: ShippingLayout,
}

/// The calculator sheet: one row per line item, then delivery and total rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculatorLayout {
    pub sheet: String,
    pub first_row: u32,
    pub last_row: u32,
    pub delivery_row: u32,
    pub total_row: u32,
    pub total_label: String,
    pub total_label_column: String,
    /// First and last input column; everything right of it holds formulas
    pub clear_from: String,
    pub clear_to: String,
    pub id_column: String,
    pub name_column: String,
    pub quantity_column: String,
    /// Price with VAT as entered by the manager
    pub price_column: String,
    pub supplier_column: String,
    pub vat_column: String,
    pub link_column: String,
}

impl Default for CalculatorLayout {
    fn default() -> Self {
        Self {
            sheet: "Калькулятор".into(),
            first_row: 3,
            last_row: 42,
            delivery_row: 43,
            total_row: 44,
            total_label: "Итого".into(),
            total_label_column: "B".into(),
            clear_from: "B".into(),
            clear_to: "H".into(),
            id_column: "B".into(),
            name_column: "C".into(),
            quantity_column: "D".into(),
            price_column: "E".into(),
            supplier_column: "F".into(),
            vat_column: "G".into(),
            link_column: "H".into(),
        }
    }
}

impl CalculatorLayout {
    /// Number of item slots
    pub fn capacity(&self) -> usize {
        self.last_row.saturating_sub(self.first_row) as usize + 1
    }

    /// Item rows, top to bottom
    pub fn item_rows(&self) -> std::ops::RangeInclusive<u32> {
        self.first_row..=self.last_row
    }
}

/// The shipping sheet: dimensions and origin of every line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingLayout {
    pub sheet: String,
    pub first_row: u32,
    pub last_row: u32,
    pub clear_from: String,
    pub clear_to: String,
    pub total_label: String,
    pub total_label_column: String,
    pub name_column: String,
    pub quantity_column: String,
    pub supplier_column: String,
    pub city_column: String,
    pub weight_column: String,
    pub length_column: String,
    pub width_column: String,
    pub height_column: String,
}

impl Default for ShippingLayout {
    fn default() -> Self {
        Self {
            sheet: "Доставка".into(),
            first_row: 3,
            last_row: 42,
            clear_from: "A".into(),
            clear_to: "H".into(),
            total_label: "Итого".into(),
            total_label_column: "A".into(),
            name_column: "B".into(),
            quantity_column: "C".into(),
            supplier_column: "D".into(),
            city_column: "E".into(),
            weight_column: "F".into(),
            length_column: "G".into(),
            width_column: "H".into(),
            height_column: "I".into(),
        }
    }
}

/// Which CRM fields feed enrichment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichSettings {
    /// Catalog list property naming the supplier (`propertyN.valueEnum`)
    pub supplier_property: u32,
    /// Deal row field holding the product link
    pub link_field: String,
}

impl Default for EnrichSettings {
    fn default() -> Self {
        Self {
            supplier_property: 196,
            link_field: "PROPERTY_206".into(),
        }
    }
}

/// Supplier details written next to each line item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierInfo {
    pub name: String,
    /// Incoming VAT label, e.g. `НДС 20%`
    pub vat_in: String,
    /// City goods ship from
    pub city: String,
}

/// Used when the supplier list value is not in `suppliers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackSupplier {
    /// Name used when the product has no supplier at all
    pub unknown_name: String,
    pub vat_in: String,
    pub city: String,
}

impl Default for FallbackSupplier {
    fn default() -> Self {
        Self {
            unknown_name: "Не указан".into(),
            vat_in: "НДС 20%".into(),
            city: "Москва".into(),
        }
    }
}

/// A named price column of the calculator with the tax terms it implies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceProfile {
    pub name: String,
    pub column: String,
    /// Sent as `TAX_RATE`, e.g. `"20.00"`
    pub tax_rate: String,
    /// Sent as `TAX_INCLUDED` (`Y`/`N`)
    pub tax_included: String,
}

impl PriceProfile {
    pub fn new(name: &str, column: &str, tax_rate: &str, tax_included: &str) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            tax_rate: tax_rate.into(),
            tax_included: tax_included.into(),
        }
    }
}

/// Catalog properties holding the purchase price per shipping company
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepriceSettings {
    /// Shipper name (case-insensitive) to catalog property number
    pub shippers: BTreeMap<String, u32>,
}

impl Default for RepriceSettings {
    fn default() -> Self {
        let mut shippers = BTreeMap::new();
        shippers.insert("ООО".to_string(), 222);
        shippers.insert("ИП".to_string(), 224);
        Self { shippers }
    }
}

impl RepriceSettings {
    /// Catalog property for a shipper
    pub fn property_for(&self, shipper: &str) -> Result<u32> {
        let wanted = shipper.trim().to_lowercase();
        self.shippers
            .iter()
            .find(|(name, _)| name.to_lowercase() == wanted)
            .map(|(_, property)| *property)
            .ok_or_else(|| Error::UnknownShipper(shipper.to_string()))
    }
}

impl Settings {
    /// Load settings.
    ///
    /// With an explicit path the file must exist. Without one,
    /// `dealsheets.toml` in the working directory is used when present.
    /// The webhook can always be overridden through `DEALSHEETS_WEBHOOK_URL`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_in(Path::new("."), path, std::env::var(WEBHOOK_ENV).ok())
    }

    /// [`load`](Self::load) with the lookup directory and the webhook
    /// override passed in. A blank override is ignored.
    pub fn load_in(dir: &Path, path: Option<&Path>, webhook: Option<String>) -> Result<Self> {
        let default_file = dir.join(CONFIG_FILE);
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None if default_file.is_file() => Self::from_file(&default_file)?,
            None => {
                tracing::debug!("no {} found, using defaults", default_file.display());
                Self::default()
            }
        };

        if let Some(url) = webhook {
            if !url.trim().is_empty() {
                settings.webhook_url = url.trim().to_string();
            }
        }

        Ok(settings)
    }

    /// Read and validate a settings file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let settings = Self::from_toml_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check the layout and the price profiles for impossible values
    pub fn validate(&self) -> Result<()> {
        let calc = &self.layout.calculator;
        let ship = &self.layout.shipping;

        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be at least 1".into()));
        }

        if calc.first_row == 0 || calc.first_row > calc.last_row {
            return Err(Error::Config(format!(
                "calculator item rows {}..{} are empty",
                calc.first_row, calc.last_row
            )));
        }
        if ship.first_row == 0 || ship.first_row > ship.last_row {
            return Err(Error::Config(format!(
                "shipping item rows {}..{} are empty",
                ship.first_row, ship.last_row
            )));
        }

        let columns = [
            &calc.total_label_column,
            &calc.clear_from,
            &calc.clear_to,
            &calc.id_column,
            &calc.name_column,
            &calc.quantity_column,
            &calc.price_column,
            &calc.supplier_column,
            &calc.vat_column,
            &calc.link_column,
            &ship.clear_from,
            &ship.clear_to,
            &ship.total_label_column,
            &ship.name_column,
            &ship.quantity_column,
            &ship.supplier_column,
            &ship.city_column,
            &ship.weight_column,
            &ship.length_column,
            &ship.width_column,
            &ship.height_column,
        ];
        for column in columns
            .into_iter()
            .chain(self.price_profiles.iter().map(|p| &p.column))
        {
            CellAddress::letters_to_column(column)
                .map_err(|e| Error::Config(format!("column '{}': {}", column, e)))?;
        }

        for profile in &self.price_profiles {
            if !matches!(profile.tax_included.as_str(), "Y" | "N") {
                return Err(Error::Config(format!(
                    "price profile '{}': tax_included must be Y or N",
                    profile.name
                )));
            }
        }

        Ok(())
    }

    /// Webhook URL, or a configuration error when none is set
    pub fn require_webhook(&self) -> Result<&str> {
        let url = self.webhook_url.trim();
        if url.is_empty() {
            return Err(Error::Config(format!(
                "webhook_url is not set (use {} or {})",
                CONFIG_FILE, WEBHOOK_ENV
            )));
        }
        Ok(url)
    }

    /// Price profile by name (case-insensitive)
    pub fn price_profile(&self, name: &str) -> Result<&PriceProfile> {
        let wanted = name.trim().to_lowercase();
        self.price_profiles
            .iter()
            .find(|p| p.name.to_lowercase() == wanted)
            .ok_or_else(|| Error::UnknownProfile(name.to_string()))
    }

    /// Supplier details for a catalog supplier value
    pub fn supplier_for(&self, supplier_enum: Option<&str>) -> SupplierInfo {
        let key = supplier_enum.map(str::trim).unwrap_or_default();
        if let Some(info) = self.suppliers.get(key) {
            return info.clone();
        }
        let fallback = &self.fallback_supplier;
        SupplierInfo {
            name: if key.is_empty() {
                fallback.unknown_name.clone()
            } else {
                key.to_string()
            },
            vat_in: fallback.vat_in.clone(),
            city: fallback.city.clone(),
        }
    }

    /// Folder holding every file of a deal
    pub fn deal_dir(&self, deal_id: u64) -> PathBuf {
        self.output_dir.join(deal_id.to_string())
    }

    /// Filled calculation of a deal
    pub fn calculation_path(&self, deal_id: u64) -> PathBuf {
        self.deal_dir(deal_id).join(format!("расчет_{}.xlsx", deal_id))
    }

    /// Field dump of a deal
    pub fn dump_path(&self, deal_id: u64) -> PathBuf {
        self.deal_dir(deal_id)
            .join(format!("база_данных_{}.xlsx", deal_id))
    }
}
