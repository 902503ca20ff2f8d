//! Delimited-text catalog codec.
//!
//! The first non-blank line names the columns; each later non-blank line is a
//! record. Fields are comma separated and may be wrapped in double quotes, in
//! which case commas inside them are kept and `""` stands for a literal quote.
//! Column order comes from the header, never from a fixed position.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;
use crate::domain::aggregates::{BundleItem, Category, Product, DEFAULT_STOCK, PLACEHOLDER_IMAGE};
use crate::domain::value_objects::{Money, ProductId};

pub const UNTITLED: &str = "Без назви";
const KIT_FALLBACK_ITEM: &str = "Монтажний набір";
const KIT_NAME_PREFIXES: [&str; 2] = ["Гібридний інвертор ", "АКБ "];

const EXPORT_COLUMNS: [&str; 12] = [
    "id", "name", "category", "subCategory", "price", "description", "image",
    "specs", "detailedTechSpecs", "datasheet", "stock", "originalPrice",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unterminated quoted field on line {line}")]
    UnterminatedQuote { line: usize },
}

/// Decodes a product list. Fewer than two non-blank lines is an empty catalog,
/// not an error.
pub fn decode(text: &str) -> Result<Vec<Product>, DecodeError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty());

    let Some((header_no, header_line)) = lines.next() else { return Ok(vec![]) };
    let header = Header::parse(header_line, header_no)?;

    lines
        .map(|(no, line)| split_record(line, no).map(|values| header.product(&values)))
        .collect()
}

/// Decodes bundle products: every record becomes a kit whose components are
/// derived from its description.
pub fn decode_kits(text: &str) -> Result<Vec<Product>, DecodeError> {
    Ok(decode(text)?
        .into_iter()
        .map(|mut p| {
            p.bundle_items = bundle_from_description(&p.description);
            p.category = Category::Kit;
            p
        })
        .collect())
}

/// Writes the catalog back out in the format [`decode`] reads.
pub fn encode(products: &[Product]) -> String {
    let mut out = EXPORT_COLUMNS.join(",");
    for p in products {
        let money = |m: Option<Money>| m.map(|m| m.amount().normalize().to_string()).unwrap_or_default();
        let row = [
            quote(p.id.as_str()),
            quote(&p.name),
            p.category.to_string(),
            quote(p.sub_category.as_deref().unwrap_or_default()),
            money(p.price),
            quote(&p.description),
            quote(&p.image),
            quote(p.specs.as_deref().unwrap_or_default()),
            quote(p.detailed_tech_specs.as_deref().unwrap_or_default()),
            quote(p.datasheet.as_deref().unwrap_or_default()),
            p.stock.to_string(),
            money(p.original_price),
        ];
        out.push('\n');
        out.push_str(&row.join(","));
    }
    out
}

fn quote(value: &str) -> String {
    // Line breaks would split the record on re-import.
    let flat = value.replace(['\r', '\n'], " ");
    format!("\"{}\"", flat.replace('"', "\"\""))
}

struct Header {
    columns: HashMap<String, usize>,
}

impl Header {
    fn parse(line: &str, line_no: usize) -> Result<Self, DecodeError> {
        let names = split_record(line.trim_start_matches('\u{feff}'), line_no)?;
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name.to_lowercase(), i))
            .collect();
        Ok(Self { columns })
    }

    fn get<'a>(&self, values: &'a [String], column: &str) -> Option<&'a str> {
        let idx = *self.columns.get(column)?;
        values.get(idx).map(String::as_str).filter(|v| !v.is_empty())
    }

    fn product(&self, values: &[String]) -> Product {
        let get = |column: &str| self.get(values, column);
        let owned = |column: &str| get(column).map(str::to_string);

        let id = get("id")
            .and_then(|v| ProductId::new(v).ok())
            .unwrap_or_else(|| ProductId::synthetic("csv"));
        let image = get("image")
            .or_else(|| get("images").and_then(|all| all.split(';').map(str::trim).find(|i| !i.is_empty())))
            .unwrap_or(PLACEHOLDER_IMAGE);

        Product {
            id,
            name: get("name").unwrap_or(UNTITLED).to_string(),
            category: get("category").map(Category::parse_or_default).unwrap_or_default(),
            sub_category: owned("subcategory"),
            price: get("price").and_then(parse_money),
            description: get("description").unwrap_or_default().to_string(),
            image: image.to_string(),
            specs: owned("specs"),
            detailed_tech_specs: owned("detailedtechspecs"),
            datasheet: owned("datasheet"),
            stock: get("stock").and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_STOCK),
            bundle_items: vec![],
            original_price: get("originalprice").and_then(parse_money),
        }
    }
}

/// Blank, non-numeric and negative prices mean "price on request".
fn parse_money(raw: &str) -> Option<Money> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    Decimal::from_str(&cleaned)
        .ok()
        .filter(|d| !d.is_sign_negative())
        .map(Money::new)
}

/// A quote opens a quoted field only at the start of the field; elsewhere it
/// is kept as text (`Panel 10" frame`).
fn split_record(line: &str, line_no: usize) -> Result<Vec<String>, DecodeError> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut started = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' if in_quotes => in_quotes = false,
            '"' if !started => {
                in_quotes = true;
                started = true;
            }
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
                started = false;
            }
            _ => {
                started |= !c.is_whitespace();
                field.push(c);
            }
        }
    }
    if in_quotes {
        return Err(DecodeError::UnterminatedQuote { line: line_no });
    }
    fields.push(field);
    Ok(fields.into_iter().map(|f| f.trim().to_string()).collect())
}

fn bundle_from_description(description: &str) -> Vec<BundleItem> {
    let parts: Vec<String> = if description.contains('+') {
        description
            .split('+')
            .map(|part| {
                let part = part.trim();
                KIT_NAME_PREFIXES
                    .iter()
                    .find_map(|prefix| strip_prefix_ignore_case(part, prefix))
                    .unwrap_or(part)
                    .to_string()
            })
            .collect()
    } else if description.contains(',') {
        description.split(',').map(|p| p.trim().to_string()).collect()
    } else {
        vec![KIT_FALLBACK_ITEM.to_string()]
    };
    parts
        .into_iter()
        .filter(|name| !name.is_empty())
        .map(|name| BundleItem { name, quantity: 1 })
        .collect()
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    (head.to_lowercase() == prefix.to_lowercase()).then(|| &value[prefix.len()..])
}
