//! Reserved-instance price table
//!
//! Reads an EC2 offer-file CSV and keeps the unit price of every row that
//! matches the configured commercial terms (term type, region, contract
//! length, purchase option, tenancy, offering class, unit, OS). The table is
//! built once per run and only read afterwards.
//!
//! A row shorter than the configured column layout aborts the build: a
//! half-read price list would misprice every instance type that follows it.

use crate::config::PricingConfig;
use crate::error::{FleetCostError, Result};
use csv::{ReaderBuilder, StringRecord};
use rust_decimal::Decimal;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Instance type -> reserved unit price (USD per 3-year term)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceTable {
    prices: BTreeMap<String, Decimal>,
}

/// Column positions resolved against the header row.
#[derive(Debug, Clone, Copy)]
struct PriceLayout {
    term_type: usize,
    location: usize,
    lease_contract_length: usize,
    purchase_option: usize,
    tenancy: usize,
    offering_class: usize,
    unit: usize,
    operating_system: usize,
    price: usize,
    instance_type: usize,
}

impl PriceLayout {
    fn resolve(config: &PricingConfig, header: &StringRecord, source_name: &str) -> Result<Self> {
        let c = &config.columns;
        Ok(Self {
            term_type: c.term_type.resolve(header, source_name)?,
            location: c.location.resolve(header, source_name)?,
            lease_contract_length: c.lease_contract_length.resolve(header, source_name)?,
            purchase_option: c.purchase_option.resolve(header, source_name)?,
            tenancy: c.tenancy.resolve(header, source_name)?,
            offering_class: c.offering_class.resolve(header, source_name)?,
            unit: c.unit.resolve(header, source_name)?,
            operating_system: c.operating_system.resolve(header, source_name)?,
            price: c.price.resolve(header, source_name)?,
            instance_type: c.instance_type.resolve(header, source_name)?,
        })
    }

    /// Minimum number of fields a data row needs.
    fn required_len(&self) -> usize {
        [
            self.term_type,
            self.location,
            self.lease_contract_length,
            self.purchase_option,
            self.tenancy,
            self.offering_class,
            self.unit,
            self.operating_system,
            self.price,
            self.instance_type,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }

    /// All eight commercial terms must match exactly.
    fn matches(&self, row: &StringRecord, config: &PricingConfig) -> bool {
        row[self.term_type] == config.term_type
            && row[self.location] == config.location
            && row[self.lease_contract_length] == config.lease_contract_length
            && row[self.purchase_option] == config.purchase_option
            && row[self.tenancy] == config.tenancy
            && row[self.offering_class] == config.offering_class
            && row[self.unit] == config.unit
            && row[self.operating_system] == config.operating_system
    }
}

impl PriceTable {
    /// Build the table from a price-list file.
    pub fn load(path: &Path, config: &PricingConfig) -> Result<Self> {
        let file = File::open(path)?;
        let table = Self::from_reader(file, config, &path.display().to_string())?;
        info!(
            "Loaded {} reserved prices from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Build the table from any CSV source. `source_name` is only used in
    /// error messages.
    pub fn from_reader<R: Read>(reader: R, config: &PricingConfig, source_name: &str) -> Result<Self> {
        let mut buffered = BufReader::new(reader);
        let mut skipped = String::new();
        for _ in 0..config.preamble_lines {
            skipped.clear();
            if buffered.read_line(&mut skipped)? == 0 {
                break;
            }
        }

        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(buffered);

        let header = csv_reader.headers()?.clone();
        let layout = PriceLayout::resolve(config, &header, source_name)?;
        let required = layout.required_len();

        let mut prices = BTreeMap::new();
        for (index, record) in csv_reader.records().enumerate() {
            let record = record?;
            // 1-based, header is row 1
            let row = index as u64 + 2;

            if record.len() < required {
                return Err(FleetCostError::MalformedPriceRow {
                    row,
                    expected: required,
                    found: record.len(),
                });
            }

            if !layout.matches(&record, config) {
                continue;
            }

            let instance_type = record[layout.instance_type].to_string();
            let raw_price = &record[layout.price];
            let price = parse_price(raw_price).ok_or_else(|| FleetCostError::InvalidPrice {
                row,
                instance_type: instance_type.clone(),
                value: raw_price.to_string(),
            })?;

            // Last matching row wins
            match prices.entry(instance_type) {
                Entry::Vacant(slot) => {
                    slot.insert(price);
                }
                Entry::Occupied(mut slot) => {
                    let previous = slot.insert(price);
                    if previous != price {
                        warn!(
                            "Duplicate reserved price for {} (row {}): {} replaces {}",
                            slot.key(),
                            row,
                            price,
                            previous
                        );
                    } else {
                        debug!("Duplicate reserved price for {} (row {})", slot.key(), row);
                    }
                }
            }
        }

        Ok(Self { prices })
    }

    /// Unit price for an instance type, if the price list had one.
    pub fn get(&self, instance_type: &str) -> Option<Decimal> {
        self.prices.get(instance_type).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl FromIterator<(String, Decimal)> for PriceTable {
    fn from_iter<I: IntoIterator<Item = (String, Decimal)>>(iter: I) -> Self {
        Self {
            prices: iter.into_iter().collect(),
        }
    }
}

fn parse_price(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}
