//! Typed W-2 record and the normalizer that builds it from untrusted JSON.
//!
//! `normalize` is total: any JSON value, however malformed, maps to a fully
//! populated record. Missing or mistyped leaves take the defaults from
//! [`crate::coerce`].

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coerce::{boolean_or_false, is_truthy, list_or_empty, number_or_zero, string_or_empty};

/// Maximum number of box 12 entries printed on a W-2.
pub const MAX_BOX_12_ITEMS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct W2 {
    pub tax_year: i32,
    pub identification_and_address: IdentificationAndAddress,
    pub federal_wages_and_taxes: FederalWagesAndTaxes,
    pub state_and_local: StateAndLocal,
    pub copies_metadata: CopiesMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentificationAndAddress {
    pub box_a_employee_ssn: String,
    pub box_b_employer_ein: String,
    pub box_c_employer_name_address_zip: EmployerAddress,
    pub box_d_control_number: String,
    pub box_e_employee_name: EmployeeName,
    pub box_f_employee_address_zip: EmployeeAddress,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmployerAddress {
    pub name: String,
    pub address_line1: String,
    pub address_line2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmployeeName {
    pub first: String,
    pub middle_initial: String,
    pub last: String,
    pub suffix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmployeeAddress {
    pub address_line1: String,
    pub address_line2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FederalWagesAndTaxes {
    pub box_1_wages_tips_other_comp: f64,
    pub box_2_federal_income_tax_withheld: f64,
    pub box_3_social_security_wages: f64,
    pub box_4_social_security_tax_withheld: f64,
    pub box_5_medicare_wages_and_tips: f64,
    pub box_6_medicare_tax_withheld: f64,
    pub box_7_social_security_tips: f64,
    pub box_8_allocated_tips: f64,
    pub box_9_reserved: String,
    pub box_10_dependent_care_benefits: f64,
    pub box_11_nonqualified_plans: f64,
    pub box_12_items: Vec<Box12Item>,
    pub box_13_checkboxes: Box13Checkboxes,
    pub box_14_other: Vec<Box14Item>,
}

/// Box 12 entry: an IRS letter code (e.g. "D", "DD") and its amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Box12Item {
    pub code: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Box13Checkboxes {
    pub statutory_employee: bool,
    pub retirement_plan: bool,
    pub third_party_sick_pay: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Box14Item {
    pub label: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateAndLocal {
    pub entries: Vec<StateEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub box_15_state: String,
    pub box_15_employer_state_id: String,
    pub box_16_state_wages: f64,
    pub box_17_state_income_tax: f64,
    pub locals: Vec<LocalEntry>,
}

/// Local tax row. Amounts stay absent when the form leaves them blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalEntry {
    pub box_20_locality_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_18_local_wages: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_19_local_income_tax: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CopiesMetadata {
    /// Which copy was photographed ("Copy A", "Copy B", ...), empty if unknown.
    pub copy: String,
    pub void_indicator: bool,
}

/// Normalize model output into a W-2, defaulting the tax year to the current year.
pub fn normalize(raw: &Value) -> W2 {
    normalize_with_year(raw, chrono::Local::now().year())
}

/// Normalize model output into a W-2 with an explicit fallback tax year.
pub fn normalize_with_year(raw: &Value, fallback_year: i32) -> W2 {
    let tax_year = match number_or_zero(raw.get("tax_year")).trunc() {
        y if y == 0.0 => fallback_year,
        y => y as i32,
    };

    W2 {
        tax_year,
        identification_and_address: IdentificationAndAddress::from_value(
            raw.get("identification_and_address"),
        ),
        federal_wages_and_taxes: FederalWagesAndTaxes::from_value(
            raw.get("federal_wages_and_taxes"),
        ),
        state_and_local: StateAndLocal::from_value(raw.get("state_and_local")),
        copies_metadata: CopiesMetadata::from_value(raw.get("copies_metadata")),
    }
}

/// Field lookup that treats non-objects as empty.
fn field<'a>(obj: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    obj.and_then(|v| v.get(key))
}

impl IdentificationAndAddress {
    fn from_value(v: Option<&Value>) -> Self {
        Self {
            box_a_employee_ssn: string_or_empty(field(v, "box_a_employee_ssn")),
            box_b_employer_ein: string_or_empty(field(v, "box_b_employer_ein")),
            box_c_employer_name_address_zip: EmployerAddress::from_value(field(
                v,
                "box_c_employer_name_address_zip",
            )),
            box_d_control_number: string_or_empty(field(v, "box_d_control_number")),
            box_e_employee_name: EmployeeName::from_value(field(v, "box_e_employee_name")),
            box_f_employee_address_zip: EmployeeAddress::from_value(field(
                v,
                "box_f_employee_address_zip",
            )),
        }
    }
}

impl EmployerAddress {
    fn from_value(v: Option<&Value>) -> Self {
        Self {
            name: string_or_empty(field(v, "name")),
            address_line1: string_or_empty(field(v, "address_line1")),
            address_line2: string_or_empty(field(v, "address_line2")),
            city: string_or_empty(field(v, "city")),
            state: string_or_empty(field(v, "state")),
            zip: string_or_empty(field(v, "zip")),
        }
    }
}

impl EmployeeName {
    fn from_value(v: Option<&Value>) -> Self {
        Self {
            first: string_or_empty(field(v, "first")),
            middle_initial: string_or_empty(field(v, "middle_initial")),
            last: string_or_empty(field(v, "last")),
            suffix: string_or_empty(field(v, "suffix")),
        }
    }
}

impl EmployeeAddress {
    fn from_value(v: Option<&Value>) -> Self {
        Self {
            address_line1: string_or_empty(field(v, "address_line1")),
            address_line2: string_or_empty(field(v, "address_line2")),
            city: string_or_empty(field(v, "city")),
            state: string_or_empty(field(v, "state")),
            zip: string_or_empty(field(v, "zip")),
        }
    }
}

impl FederalWagesAndTaxes {
    fn from_value(v: Option<&Value>) -> Self {
        let num = |key: &str| number_or_zero(field(v, key));

        // Older records spell box 10 "dependant".
        let box_10 = field(v, "box_10_dependent_care_benefits")
            .or_else(|| field(v, "box_10_dependant_care_benefits"));

        let box_12_items = list_or_empty(field(v, "box_12_items"))
            .iter()
            .filter(|item| is_truthy(item.get("code")))
            .take(MAX_BOX_12_ITEMS)
            .map(|item| Box12Item {
                code: string_or_empty(item.get("code")),
                amount: number_or_zero(item.get("amount")),
            })
            .collect();

        let box_14_other = list_or_empty(field(v, "box_14_other"))
            .iter()
            .filter(|item| is_truthy(item.get("label")) || is_truthy(item.get("amount")))
            .map(|item| Box14Item {
                label: string_or_empty(item.get("label")),
                amount: number_or_zero(item.get("amount")),
            })
            .collect();

        Self {
            box_1_wages_tips_other_comp: num("box_1_wages_tips_other_comp"),
            box_2_federal_income_tax_withheld: num("box_2_federal_income_tax_withheld"),
            box_3_social_security_wages: num("box_3_social_security_wages"),
            box_4_social_security_tax_withheld: num("box_4_social_security_tax_withheld"),
            box_5_medicare_wages_and_tips: num("box_5_medicare_wages_and_tips"),
            box_6_medicare_tax_withheld: num("box_6_medicare_tax_withheld"),
            box_7_social_security_tips: num("box_7_social_security_tips"),
            box_8_allocated_tips: num("box_8_allocated_tips"),
            box_9_reserved: string_or_empty(field(v, "box_9_reserved")),
            box_10_dependent_care_benefits: number_or_zero(box_10),
            box_11_nonqualified_plans: num("box_11_nonqualified_plans"),
            box_12_items,
            box_13_checkboxes: Box13Checkboxes::from_value(field(v, "box_13_checkboxes")),
            box_14_other,
        }
    }
}

impl Box13Checkboxes {
    fn from_value(v: Option<&Value>) -> Self {
        Self {
            statutory_employee: boolean_or_false(field(v, "statutory_employee")),
            retirement_plan: boolean_or_false(field(v, "retirement_plan")),
            third_party_sick_pay: boolean_or_false(field(v, "third_party_sick_pay")),
        }
    }
}

impl StateAndLocal {
    fn from_value(v: Option<&Value>) -> Self {
        Self {
            entries: list_or_empty(field(v, "entries"))
                .iter()
                .map(StateEntry::from_value)
                .collect(),
        }
    }
}

impl StateEntry {
    fn from_value(v: &Value) -> Self {
        let locals = list_or_empty(v.get("locals"))
            .iter()
            .filter(|l| {
                is_truthy(l.get("box_20_locality_name"))
                    || is_truthy(l.get("box_18_local_wages"))
                    || is_truthy(l.get("box_19_local_income_tax"))
            })
            .map(LocalEntry::from_value)
            .collect();

        Self {
            box_15_state: string_or_empty(v.get("box_15_state")),
            box_15_employer_state_id: string_or_empty(v.get("box_15_employer_state_id")),
            box_16_state_wages: number_or_zero(v.get("box_16_state_wages")),
            box_17_state_income_tax: number_or_zero(v.get("box_17_state_income_tax")),
            locals,
        }
    }
}

impl LocalEntry {
    fn from_value(v: &Value) -> Self {
        let optional_amount = |key: &str| match v.get(key) {
            None | Some(Value::Null) => None,
            amount => Some(number_or_zero(amount)),
        };

        Self {
            box_20_locality_name: string_or_empty(v.get("box_20_locality_name")),
            box_18_local_wages: optional_amount("box_18_local_wages"),
            box_19_local_income_tax: optional_amount("box_19_local_income_tax"),
        }
    }
}

impl CopiesMetadata {
    fn from_value(v: Option<&Value>) -> Self {
        Self {
            copy: string_or_empty(field(v, "copy")),
            void_indicator: boolean_or_false(field(v, "void_indicator")),
        }
    }
}
