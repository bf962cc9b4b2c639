//! # Prompt Templates
//!
//! Versioned templates keyed by item number with a generic fallback.
//! Variables are `{franchisor_name}`, `{issue_year}`, `{item_title}`,
//! and `{section_text}`. The template version is recorded with every
//! extraction result so downstream consumers can segment by prompt
//! generation.

use fdd_core::ItemNo;

/// Prepend the shared extraction preamble at compile time.
macro_rules! with_preamble {
    ($body:expr) => {
        concat!(
            "You are extracting structured data from a Franchise Disclosure Document filed by \
{franchisor_name} (issue year {issue_year}). Respond with JSON conforming exactly to the \
provided schema. Use integer cents for all monetary amounts. If a value is not disclosed, omit \
the entry rather than guessing.\n\n",
            $body
        )
    };
}

/// A versioned prompt template.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub version: u32,
    body: &'static str,
}

/// Variables substituted into a template.
#[derive(Debug, Clone)]
pub struct PromptVars<'a> {
    pub franchisor_name: &'a str,
    pub issue_year: i32,
    pub item_title: &'a str,
    pub section_text: &'a str,
}

impl PromptTemplate {
    /// Render the template with the given variables.
    pub fn render(&self, vars: &PromptVars<'_>) -> String {
        self.body
            .replace("{franchisor_name}", vars.franchisor_name)
            .replace("{issue_year}", &vars.issue_year.to_string())
            .replace("{item_title}", vars.item_title)
            .replace("{section_text}", vars.section_text)
    }
}

const ITEM_5_TEMPLATE: PromptTemplate = PromptTemplate {
    version: 3,
    body: with_preamble!(
        "Extract every initial fee from the Item 5 section below. One entry per distinct fee. \
Record whether each fee is refundable and any conditions verbatim.\n\nSection text:\n{section_text}"
    ),
};

const ITEM_6_TEMPLATE: PromptTemplate = PromptTemplate {
    version: 3,
    body: with_preamble!(
        "Extract every recurring or other fee from the Item 6 table below. A fee has EITHER a \
fixed amount in cents OR a percentage, never both. Record frequency and the basis the fee is \
computed against.\n\nSection text:\n{section_text}"
    ),
};

const ITEM_7_TEMPLATE: PromptTemplate = PromptTemplate {
    version: 2,
    body: with_preamble!(
        "Extract the estimated initial investment table from the Item 7 section below. One entry \
per category row with low and high estimates in cents, when due, and to whom paid.\n\n\
Section text:\n{section_text}"
    ),
};

const ITEM_19_TEMPLATE: PromptTemplate = PromptTemplate {
    version: 4,
    body: with_preamble!(
        "The Item 19 section below contains a financial performance representation. Identify the \
disclosure type, sample size, and covered period, then extract the aggregated revenue and \
profit metrics (low, average, median when given, high) in cents.\n\nSection text:\n{section_text}"
    ),
};

const ITEM_20_TEMPLATE: PromptTemplate = PromptTemplate {
    version: 3,
    body: with_preamble!(
        "Extract the outlet summary tables from the Item 20 section below. Produce one row per \
(fiscal year, outlet type) with outlets at start, opened, closed, transferred in, transferred \
out, and outlets at end.\n\nSection text:\n{section_text}"
    ),
};

const ITEM_21_TEMPLATE: PromptTemplate = PromptTemplate {
    version: 2,
    body: with_preamble!(
        "Extract one row per fiscal year from the Item 21 financial statements below: revenue, \
net income, total assets, total liabilities, and total equity, all in cents.\n\n\
Section text:\n{section_text}"
    ),
};

const GENERIC_TEMPLATE: PromptTemplate = PromptTemplate {
    version: 1,
    body: with_preamble!(
        "Summarize the material disclosures in the \"{item_title}\" section below as structured \
JSON. Include a concise \"summary\" field and any clearly tabulated data.\n\n\
Section text:\n{section_text}"
    ),
};

/// The template for an item: specialized for the six high-value items,
/// generic otherwise.
pub fn template_for(item_no: ItemNo) -> PromptTemplate {
    match item_no.as_u8() {
        5 => ITEM_5_TEMPLATE,
        6 => ITEM_6_TEMPLATE,
        7 => ITEM_7_TEMPLATE,
        19 => ITEM_19_TEMPLATE,
        20 => ITEM_20_TEMPLATE,
        21 => ITEM_21_TEMPLATE,
        _ => GENERIC_TEMPLATE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_all_variables() {
        let vars = PromptVars {
            franchisor_name: "Acme Burgers",
            issue_year: 2023,
            item_title: "Initial Fees",
            section_text: "The initial franchise fee is $45,000.",
        };
        let rendered = template_for(ItemNo::INITIAL_FEES).render(&vars);
        assert!(rendered.contains("Acme Burgers"));
        assert!(rendered.contains("2023"));
        assert!(rendered.contains("The initial franchise fee is $45,000."));
        assert!(!rendered.contains("{franchisor_name}"));
        assert!(!rendered.contains("{section_text}"));
    }

    #[test]
    fn generic_template_carries_item_title() {
        let vars = PromptVars {
            franchisor_name: "Acme",
            issue_year: 2024,
            item_title: "Litigation",
            section_text: "None.",
        };
        let rendered = template_for(ItemNo::new(3).unwrap()).render(&vars);
        assert!(rendered.contains("\"Litigation\""));
    }

    #[test]
    fn high_value_items_have_dedicated_templates() {
        for no in [5u8, 6, 7, 19, 20, 21] {
            let item = ItemNo::new(no).unwrap();
            assert_ne!(template_for(item).body, GENERIC_TEMPLATE.body);
        }
    }
}
