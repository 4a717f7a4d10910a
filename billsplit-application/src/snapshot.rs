//! Serialized bill boundary.
//!
//! Bills arrive as JSON written by whatever front end collected them, with
//! loosely typed fields. Everything is normalized here so the engine only
//! ever sees well-formed domain values:
//! - numbers may be JSON numbers, numeric strings, `null`, or missing; anything
//!   unparseable becomes 0
//! - `consumedBy` entries may be bare person ids or `{personId, value}` objects
//! - unknown `splitType`/`discountType` strings fall back to `equal`/`flat`

use crate::{error::SnapshotError, session::SettlementResult};
use billsplit_domain::{
    Allocation, Bill, DiscountType, Item, LineItem, Money, Person, PersonId, PersonTotal, Section,
    SectionId, SectionSummary, SplitType,
};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillSnapshot {
    #[serde(default, deserialize_with = "lenient_list")]
    pub people: Vec<PersonRecord>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub items: Vec<ItemRecord>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub sections: Vec<SectionRecord>,
    #[serde(default, deserialize_with = "lenient_optional_decimal")]
    pub default_tax_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRecord {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub tax_amount: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub price: Decimal,
    #[serde(default = "default_quantity", deserialize_with = "lenient_quantity")]
    pub quantity: u32,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub discount: Decimal,
    #[serde(default, deserialize_with = "lenient_discount_type")]
    pub discount_type: DiscountType,
    #[serde(default, deserialize_with = "lenient_id")]
    pub section_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_split_type")]
    pub split_type: SplitType,
    #[serde(default, deserialize_with = "lenient_list")]
    pub consumed_by: Vec<AllocationRecord>,
}

/// A `consumedBy` entry in either of its stored shapes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub struct AllocationRecord {
    pub person_id: Option<String>,
    pub value: Decimal,
}

impl From<Value> for AllocationRecord {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self {
                person_id: fields.get("personId").and_then(id_from_value),
                value: fields
                    .get("value")
                    .map(coerce_decimal)
                    .unwrap_or(Decimal::ONE),
            },
            other => Self {
                person_id: id_from_value(&other),
                value: Decimal::ONE,
            },
        }
    }
}

impl BillSnapshot {
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Default tax: `defaultTaxAmount` when given, else the tax of a section
    /// stored with a `null` id.
    fn default_tax(&self) -> Decimal {
        self.default_tax_amount
            .or_else(|| {
                self.sections
                    .iter()
                    .find(|section| section.id.is_none())
                    .map(|section| section.tax_amount)
            })
            .unwrap_or(Decimal::ZERO)
    }

    pub fn into_bill(self) -> Bill {
        let default_tax = Money::from_decimal(self.default_tax());

        let people = self
            .people
            .into_iter()
            .map(|record| Person {
                id: PersonId::new(record.id),
                name: record.name,
            })
            .collect();

        let sections = self
            .sections
            .into_iter()
            .filter_map(|record| {
                Some(Section {
                    id: SectionId::new(record.id?),
                    name: record.name,
                    tax_amount: Money::from_decimal(record.tax_amount),
                })
            })
            .collect();

        let items = self
            .items
            .into_iter()
            .map(|record| Item {
                id: record.id.as_str().into(),
                name: record.name,
                price: Money::from_decimal(record.price),
                quantity: record.quantity,
                discount: record.discount,
                discount_type: record.discount_type,
                section_id: record.section_id.map(SectionId::new),
                split_type: record.split_type,
                consumed_by: record
                    .consumed_by
                    .into_iter()
                    .filter_map(|allocation| {
                        Some(Allocation::new(
                            PersonId::new(allocation.person_id?),
                            allocation.value,
                        ))
                    })
                    .collect(),
            })
            .collect();

        Bill {
            people,
            items,
            sections,
            default_tax,
        }
    }
}

impl From<BillSnapshot> for Bill {
    fn from(snapshot: BillSnapshot) -> Self {
        snapshot.into_bill()
    }
}

fn default_quantity() -> u32 {
    1
}

fn coerce_decimal(value: &Value) -> Decimal {
    match value {
        Value::Number(number) => parse_decimal(&number.to_string()),
        Value::String(text) => parse_decimal(text.trim()),
        _ => Decimal::ZERO,
    }
}

fn parse_decimal(text: &str) -> Decimal {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .unwrap_or(Decimal::ZERO)
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn lenient_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(coerce_decimal).unwrap_or(Decimal::ZERO))
}

fn lenient_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .filter(|value| !value.is_null())
        .map(|value| coerce_decimal(&value)))
}

/// Whole units, at least one.
fn lenient_quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let quantity = value
        .as_ref()
        .map(coerce_decimal)
        .and_then(|quantity| quantity.trunc().to_u32())
        .unwrap_or(1);
    Ok(quantity.max(1))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(id_from_value).unwrap_or_default())
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(id_from_value))
}

fn lenient_split_type<'de, D>(deserializer: D) -> Result<SplitType, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value.as_ref().and_then(Value::as_str) {
        Some("percentage") => SplitType::Percentage,
        Some("fraction") => SplitType::Fraction,
        _ => SplitType::Equal,
    })
}

fn lenient_discount_type<'de, D>(deserializer: D) -> Result<DiscountType, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value.as_ref().and_then(Value::as_str) {
        Some("percentage") => DiscountType::Percentage,
        _ => DiscountType::Flat,
    })
}

/// `null` reads as an empty list.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReport {
    pub people: Vec<PersonTotalRecord>,
    pub sections: Vec<SectionSummaryRecord>,
    /// Every item's line total, assigned or not.
    pub subtotal: String,
    pub assigned_subtotal: String,
    pub tax: String,
    pub grand_total: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonTotalRecord {
    pub person_id: String,
    pub name: String,
    pub line_items: Vec<LineItemRecord>,
    pub subtotal: String,
    pub tax: String,
    pub total: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRecord {
    pub item_id: String,
    pub name: String,
    pub unit_price_after_discount: String,
    pub quantity: u32,
    pub split_type: &'static str,
    pub allocation_value: String,
    pub share: String,
    pub co_assignee_count: usize,
    pub discount: String,
    pub discount_type: &'static str,
    pub section_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSummaryRecord {
    pub section_id: Option<String>,
    pub name: Option<String>,
    pub subtotal: String,
    pub tax: String,
    pub total: String,
}

impl SettlementReport {
    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl From<&SettlementResult> for SettlementReport {
    fn from(result: &SettlementResult) -> Self {
        let settlement = &result.settlement;
        Self {
            people: settlement
                .person_totals
                .iter()
                .map(PersonTotalRecord::from)
                .collect(),
            sections: result
                .sections
                .iter()
                .map(SectionSummaryRecord::from)
                .collect(),
            subtotal: result.bill_subtotal.to_string(),
            assigned_subtotal: settlement.subtotal().to_string(),
            tax: settlement.tax().to_string(),
            grand_total: settlement.grand_total().to_string(),
        }
    }
}

impl From<&PersonTotal> for PersonTotalRecord {
    fn from(total: &PersonTotal) -> Self {
        Self {
            person_id: total.person_id.to_string(),
            name: total.name.clone(),
            line_items: total.line_items.iter().map(LineItemRecord::from).collect(),
            subtotal: total.subtotal.to_string(),
            tax: total.tax.to_string(),
            total: total.total.to_string(),
        }
    }
}

impl From<&LineItem> for LineItemRecord {
    fn from(line: &LineItem) -> Self {
        Self {
            item_id: line.item_id.to_string(),
            name: line.name.clone(),
            unit_price_after_discount: line.unit_price_after_discount.to_string(),
            quantity: line.quantity,
            split_type: line.split_type.as_str(),
            allocation_value: line.allocation_value.normalize().to_string(),
            share: line.share.to_string(),
            co_assignee_count: line.co_assignee_count,
            discount: line.discount.normalize().to_string(),
            discount_type: line.discount_type.as_str(),
            section_id: line.section_id.as_ref().map(ToString::to_string),
        }
    }
}

impl From<&SectionSummary> for SectionSummaryRecord {
    fn from(summary: &SectionSummary) -> Self {
        Self {
            section_id: summary.section_id.as_ref().map(ToString::to_string),
            name: summary.name.clone(),
            subtotal: summary.subtotal.to_string(),
            tax: summary.tax.to_string(),
            total: summary.total.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billsplit_domain::ItemId;
    use rstest::rstest;

    fn decode(json: &str) -> Bill {
        BillSnapshot::from_json(json)
            .expect("snapshot should decode")
            .into_bill()
    }

    fn single_item(fields: &str) -> Item {
        let bill = decode(&format!(r#"{{"items": [{{"id": "i1", {fields}}}]}}"#));
        bill.items.into_iter().next().expect("one item")
    }

    #[rstest]
    #[case::number(r#""price": 12.5"#, Decimal::new(125, 1))]
    #[case::numeric_string(r#""price": " 7.25 ""#, Decimal::new(725, 2))]
    #[case::null(r#""price": null"#, Decimal::ZERO)]
    #[case::garbage(r#""price": "abc""#, Decimal::ZERO)]
    #[case::object(r#""price": {"amount": 3}"#, Decimal::ZERO)]
    #[case::missing(r#""name": "x""#, Decimal::ZERO)]
    #[case::scientific(r#""price": 1.5e2"#, Decimal::from(150))]
    fn price_coercion(#[case] fields: &str, #[case] expected: Decimal) {
        assert_eq!(single_item(fields).price.as_decimal(), expected);
    }

    #[rstest]
    #[case::missing(r#""name": "x""#, 1)]
    #[case::integer(r#""quantity": 3"#, 3)]
    #[case::string(r#""quantity": "4""#, 4)]
    #[case::fraction_truncates(r#""quantity": 2.9"#, 2)]
    #[case::zero(r#""quantity": 0"#, 1)]
    #[case::negative(r#""quantity": -2"#, 1)]
    #[case::garbage(r#""quantity": "lots""#, 1)]
    fn quantity_coercion(#[case] fields: &str, #[case] expected: u32) {
        assert_eq!(single_item(fields).quantity, expected);
    }

    #[rstest]
    #[case::percentage(r#""splitType": "percentage""#, SplitType::Percentage)]
    #[case::fraction(r#""splitType": "fraction""#, SplitType::Fraction)]
    #[case::unknown(r#""splitType": "shares""#, SplitType::Equal)]
    #[case::missing(r#""name": "x""#, SplitType::Equal)]
    fn split_type_fallback(#[case] fields: &str, #[case] expected: SplitType) {
        assert_eq!(single_item(fields).split_type, expected);
    }

    #[test]
    fn consumed_by_shapes_normalize_to_allocations() {
        let item = single_item(
            r#""splitType": "fraction", "consumedBy": ["ann", {"personId": "bob", "value": "2"}, {"personId": 7}, null, {"value": 3}]"#,
        );

        assert_eq!(
            item.consumed_by,
            vec![
                Allocation::new("ann", Decimal::ONE),
                Allocation::new("bob", Decimal::TWO),
                Allocation::new("7", Decimal::ONE),
            ]
        );
    }

    #[test]
    fn decodes_a_full_bill() {
        let bill = decode(
            r#"{
                "people": [{"id": "v", "name": "Victor"}, {"id": "w", "name": "Wendy"}],
                "sections": [{"id": "bar", "name": "Bar", "taxAmount": "2.50"}],
                "items": [
                    {"id": "a", "name": "A", "price": 30, "consumedBy": ["v", "w"]},
                    {"id": "b", "name": "B", "price": 50, "quantity": 2, "sectionId": "bar",
                     "discount": 10, "discountType": "percentage",
                     "consumedBy": [{"personId": "w", "value": 1}]}
                ],
                "defaultTaxAmount": 13
            }"#,
        );

        assert_eq!(bill.people.len(), 2);
        assert_eq!(bill.default_tax, Money::from_i64(13));
        assert_eq!(bill.sections[0].tax_amount, Money::new(25, 1));

        let b = bill.item(&ItemId::from("b")).expect("item b");
        assert_eq!(b.section_id, Some(SectionId::from("bar")));
        assert_eq!(b.discount_type, DiscountType::Percentage);
        assert_eq!(b.quantity, 2);
    }

    #[test]
    fn null_section_supplies_default_tax() {
        let bill = decode(r#"{"sections": [{"id": null, "name": "Default", "taxAmount": 4}]}"#);

        assert!(bill.sections.is_empty());
        assert_eq!(bill.default_tax, Money::from_i64(4));
    }

    #[test]
    fn explicit_default_tax_wins_over_null_section() {
        let bill = decode(
            r#"{"defaultTaxAmount": 1, "sections": [{"id": null, "name": "Default", "taxAmount": 4}]}"#,
        );
        assert_eq!(bill.default_tax, Money::from_i64(1));
    }

    #[test]
    fn null_lists_read_as_empty() {
        let bill = decode(r#"{"people": null, "items": null, "sections": null}"#);
        assert_eq!(bill, Bill::default());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            BillSnapshot::from_json("{"),
            Err(SnapshotError::Malformed(_))
        ));
    }

    #[test]
    fn report_uses_camel_case_and_decimal_strings() {
        let bill = decode(
            r#"{
                "people": [{"id": "v", "name": "Victor"}],
                "items": [{"id": "a", "name": "A", "price": 30, "consumedBy": ["v"]}],
                "defaultTaxAmount": 3
            }"#,
        );
        let report = SettlementReport::from(&SettlementResult::from_bill(&bill));
        let json: Value =
            serde_json::from_str(&report.to_json_pretty().expect("report should encode"))
                .expect("valid json");

        assert_eq!(json["grandTotal"], "33");
        assert_eq!(json["people"][0]["personId"], "v");
        assert_eq!(json["people"][0]["lineItems"][0]["splitType"], "equal");
        assert_eq!(json["people"][0]["lineItems"][0]["coAssigneeCount"], 1);
        assert_eq!(json["sections"][0]["sectionId"], Value::Null);
    }
}
