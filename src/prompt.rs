//! Transcription prompt sent to the vision model with every W-2 image.

pub const W2_PROMPT: &str = r#"You are an extraction model. Given an image of a U.S. IRS Form W-2 (any copy), output ONLY one JSON object that matches the template and rules below. Do not include any text, explanations, code fences, or comments. Return JSON only.

STRICT RULES
1) Output exactly the keys shown in the template below. No extra or missing keys.
2) If a value is not present or unreadable, set it to null (not an empty string and not 0.00).
3) Dollar amounts: numbers with exactly two decimals, no currency symbols and no thousands separators (e.g. 12345.67).
4) Identifiers that can start with 0 (SSN, EIN, ZIP) are strings, normalized as:
   - SSN: "NNN-NN-NNNN"
   - EIN: "NN-NNNNNNN"
   - ZIP: "NNNNN" or "NNNNN-NNNN"
5) State codes: two-letter USPS abbreviations (e.g. "CA").
6) Box 12 codes must be one of:
   A,B,C,D,E,F,G,H,J,K,L,M,N,P,Q,R,S,T,V,W,Y,Z,AA,BB,DD,EE,FF,GG,HH,II
7) Booleans must be true or false (not strings).
8) If the image shows multiple state/local rows, include each as a separate object under state_and_local.entries, and include each locality under locals.
9) Do not infer or fabricate values. Use null if unsure.

RETURN THIS JSON TEMPLATE FILLED WITH EXTRACTED VALUES:

{
  "tax_year": null,
  "identification_and_address": {
    "box_a_employee_ssn": null,
    "box_b_employer_ein": null,
    "box_c_employer_name_address_zip": {
      "name": null,
      "address_line1": null,
      "address_line2": null,
      "city": null,
      "state": null,
      "zip": null
    },
    "box_d_control_number": null,
    "box_e_employee_name": {
      "first": null,
      "middle_initial": null,
      "last": null,
      "suffix": null
    },
    "box_f_employee_address_zip": {
      "address_line1": null,
      "address_line2": null,
      "city": null,
      "state": null,
      "zip": null
    }
  },
  "federal_wages_and_taxes": {
    "box_1_wages_tips_other_comp": null,
    "box_2_federal_income_tax_withheld": null,
    "box_3_social_security_wages": null,
    "box_4_social_security_tax_withheld": null,
    "box_5_medicare_wages_and_tips": null,
    "box_6_medicare_tax_withheld": null,
    "box_7_social_security_tips": null,
    "box_8_allocated_tips": null,
    "box_9_reserved": null,
    "box_10_dependent_care_benefits": null,
    "box_11_nonqualified_plans": null,
    "box_12_items": [
      {
        "code": null,
        "amount": null
      }
    ],
    "box_13_checkboxes": {
      "statutory_employee": null,
      "retirement_plan": null,
      "third_party_sick_pay": null
    },
    "box_14_other": [
      {
        "label": null,
        "amount": null
      }
    ]
  },
  "state_and_local": {
    "entries": [
      {
        "box_15_state": null,
        "box_15_employer_state_id": null,
        "box_16_state_wages": null,
        "box_17_state_income_tax": null,
        "locals": [
          {
            "box_20_locality_name": null,
            "box_18_local_wages": null,
            "box_19_local_income_tax": null
          }
        ]
      }
    ]
  },
  "copies_metadata": {
    "copy": null,
    "void_indicator": null
  }
}
"#;
