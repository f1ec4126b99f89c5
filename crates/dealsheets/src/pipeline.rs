//! The deal workflow: import, dump, export, reprice and catalog export

use std::path::{Path, PathBuf};

use chrono::Local;
use dealsheets_crm::{deal_link, CrmApi};

use crate::archive::{archive_existing_files, Archived};
use crate::catalog::dump_catalog;
use crate::config::Settings;
use crate::dump::{write_dump, DealInfo};
use crate::enrich::{enrich, load_items, DealItem};
use crate::error::{Error, Result};
use crate::export::{export_calculation, PriceSource};
use crate::reprice::reprice_deal;
use crate::template::{capacity, fill_template};

/// What an import produced
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub items: usize,
    pub archived: Option<Archived>,
    /// `None` when the rows carried no fields to dump
    pub dump: Option<PathBuf>,
    pub calculation: PathBuf,
}

/// Rows sent by one export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub source: String,
    pub rows: usize,
}

/// Runs the workflow steps against a CRM
pub struct Pipeline<A> {
    api: A,
    settings: Settings,
}

impl<A: CrmApi> Pipeline<A> {
    pub fn new(api: A, settings: Settings) -> Self {
        Self { api, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Load the deal's rows with their catalog products
    fn load(&self, deal_id: u64) -> Result<Vec<DealItem>> {
        tracing::info!(deal_id, "loading line items");
        let rows = self.api.deal_product_rows(deal_id)?;
        load_items(&self.api, rows)
    }

    fn dump_items(&self, deal_id: u64, items: &[DealItem]) -> Result<Option<PathBuf>> {
        let info = DealInfo {
            deal: self.api.deal(deal_id)?,
            link: deal_link(&self.settings.webhook_url, deal_id),
            exported_at: Some(Local::now().naive_local()),
        };
        let path = self.settings.dump_path(deal_id);
        let written = write_dump(items, &info, &path)?;
        Ok(written.then_some(path))
    }

    /// Import a deal into a fresh calculation.
    ///
    /// Earlier files of the deal are archived first. Returns `None` when the
    /// deal has no line items; nothing is touched in that case.
    pub fn import(&self, deal_id: u64) -> Result<Option<ImportReport>> {
        let items = self.load(deal_id)?;
        if items.is_empty() {
            tracing::warn!(deal_id, "deal has no line items");
            return Ok(None);
        }
        let capacity = capacity(&self.settings.layout);
        if items.len() > capacity {
            return Err(Error::TooManyItems {
                count: items.len(),
                capacity,
            });
        }
        let template = &self.settings.template_path;
        if !template.is_file() {
            return Err(Error::FileNotFound(template.clone()));
        }

        let archived = archive_existing_files(&self.settings.deal_dir(deal_id))?;
        let dump = self.dump_items(deal_id, &items)?;

        tracing::info!(deal_id, items = items.len(), "filling the calculation");
        let lines = enrich(&self.settings, &items);
        let calculation = self.settings.calculation_path(deal_id);
        fill_template(&self.settings.layout, &lines, template, &calculation)?;

        Ok(Some(ImportReport {
            items: lines.len(),
            archived,
            dump,
            calculation,
        }))
    }

    /// Write only the field dump of a deal
    pub fn dump(&self, deal_id: u64) -> Result<Option<PathBuf>> {
        let items = self.load(deal_id)?;
        if items.is_empty() {
            tracing::warn!(deal_id, "deal has no line items");
            return Ok(None);
        }
        self.dump_items(deal_id, &items)
    }

    /// Send the deal's calculation back, priced from `source`
    pub fn export(&self, deal_id: u64, source: &PriceSource) -> Result<ExportReport> {
        let path = self.settings.calculation_path(deal_id);
        let rows = export_calculation(
            &self.api,
            deal_id,
            &path,
            &self.settings.layout.calculator,
            source,
        )?;
        Ok(ExportReport {
            source: source.to_string(),
            rows,
        })
    }

    /// Export with a named price profile, or entered prices without one
    pub fn export_profile(&self, deal_id: u64, profile: Option<&str>) -> Result<ExportReport> {
        let source = match profile {
            Some(name) => PriceSource::Profile(self.settings.price_profile(name)?.clone()),
            None => PriceSource::Entered,
        };
        self.export(deal_id, &source)
    }

    /// Export once per configured price profile, in order
    pub fn export_all_profiles(&self, deal_id: u64) -> Result<Vec<ExportReport>> {
        self.settings
            .price_profiles
            .iter()
            .map(|profile| self.export(deal_id, &PriceSource::Profile(profile.clone())))
            .collect()
    }

    /// Re-price the deal from the catalog prices of a shipper
    pub fn reprice(&self, deal_id: u64, shipper: &str) -> Result<usize> {
        let property = self.settings.reprice.property_for(shipper)?;
        tracing::info!(deal_id, shipper, property, "repricing");
        reprice_deal(&self.api, deal_id, property)
    }

    /// Export the whole product catalog
    pub fn catalog(&self, output: &Path) -> Result<usize> {
        dump_catalog(&self.api, output)
    }
}
