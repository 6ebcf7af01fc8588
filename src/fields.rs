//! Bilingual field schema for customs export declarations.
//!
//! Two tables live here. The label table maps the Chinese labels printed on the
//! declaration form to English dotted paths in the extracted JSON. The
//! comparison table lists every field in display order, grouped the same way
//! as the JSON, together with per-model path overrides for models that answer
//! with their own flat key names.

/// A path override for one model: `Some(path)` reads that path instead of the
/// default, `None` means the model never produces this field.
pub type PathOverride = (&'static str, Option<&'static str>);

/// One row of the comparison table
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Dotted path relative to the owning group
    pub path: &'static str,
    /// English display name
    pub display_name: &'static str,
    pub overrides: &'static [PathOverride],
}

impl FieldSpec {
    /// Override registered for `model`, if any.
    ///
    /// The outer `Option` tells whether the model has an override at all, the
    /// inner one whether that override points anywhere.
    pub fn override_for(&self, model: &str) -> Option<Option<&'static str>> {
        self.overrides
            .iter()
            .find(|(name, _)| *name == model)
            .map(|(_, path)| *path)
    }

    /// Path to read for `model`, falling back to `default` when no override exists.
    /// Returns `None` when the model is known not to produce the field.
    pub fn path_for<'a>(&self, model: &str, default: &'a str) -> Option<&'a str> {
        match self.override_for(model) {
            Some(path) => path,
            None => Some(default),
        }
    }
}

/// A named group of fields (`document_info`, `parties`, ...)
#[derive(Debug, Clone, Copy)]
pub struct FieldGroup {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl FieldGroup {
    /// Whether this is the per-item group, which is laid out per line item
    pub fn is_items(&self) -> bool {
        self.name == ITEMS_GROUP
    }

    /// Absolute dotted path of a field in this group
    pub fn full_path(&self, field: &FieldSpec) -> String {
        format!("{}.{}", self.name, field.path)
    }
}

pub const ITEMS_GROUP: &str = "items";

const MISTRAL: &str = "mistral-small3.2_latest";
const QWEN_32B: &str = "qwen3-vl_32b";
const QWEN_235B: &str = "qwen3-vl_235b-cloud";

macro_rules! field {
    ($path:expr, $name:expr) => {
        FieldSpec {
            path: $path,
            display_name: $name,
            overrides: &[],
        }
    };
    ($path:expr, $name:expr, [$(($model:expr, $over:expr)),* $(,)?]) => {
        FieldSpec {
            path: $path,
            display_name: $name,
            overrides: &[$(($model, $over)),*],
        }
    };
}

/// Comparison table, in display order
pub static FIELD_GROUPS: &[FieldGroup] = &[
    FieldGroup {
        name: "document_info",
        fields: &[
            field!("document_type", "Document Type", [(MISTRAL, Some("document_type")), (QWEN_32B, Some("document_type"))]),
            field!("customs_declaration_no", "Customs Declaration No.", [(MISTRAL, Some("customs_declaration_number")), (QWEN_32B, Some("DeclarationNo"))]),
            field!("declaration_date", "Declaration Date", [(MISTRAL, Some("declaration_date")), (QWEN_32B, Some("DateOfDeclaration"))]),
            field!("export_date", "Export Date", [(MISTRAL, Some("declaration_date")), (QWEN_32B, Some("DateOfEntry"))]),
        ],
    },
    FieldGroup {
        name: "parties",
        fields: &[
            field!("consignor.name", "Consignor Name", [(MISTRAL, Some("declaration_company")), (QWEN_32B, Some("ConsignorName"))]),
            field!("consignor.code", "Consignor Code", [(MISTRAL, Some("declaration_company_address")), (QWEN_32B, Some("ConsignorNo"))]),
            field!("consignee", "Consignee", [(MISTRAL, Some("consignee")), (QWEN_32B, Some("ConsigneeName"))]),
            field!("declaring_agent", "Declaring Agent", [(MISTRAL, Some("declarant")), (QWEN_32B, Some("Declarant"))]),
        ],
    },
    FieldGroup {
        name: "coded_attributes",
        fields: &[
            field!("trade_mode", "Trade Mode", [(MISTRAL, None), (QWEN_32B, Some("TradeTerms"))]),
            field!("trade_mode_id", "Trade Mode ID"),
            field!("levy_nature", "Levy Nature", [(MISTRAL, None), (QWEN_32B, Some("ExemptionType"))]),
            field!("levy_nature_id", "Levy Nature ID"),
            field!("customs_office", "Customs Office", [(MISTRAL, Some("declaration_port")), (QWEN_32B, Some("CustomsName"))]),
            field!("customs_office_id", "Customs Office ID"),
            field!("exit_port", "Exit Port", [(MISTRAL, Some("declaration_port")), (QWEN_32B, Some("PortOfLoading"))]),
            field!("exit_port_id", "Exit Port ID"),
            field!("transaction_mode", "Transaction Mode", [(MISTRAL, None), (QWEN_32B, Some("TradeTerms"))]),
            field!("transaction_mode_id", "Transaction Mode ID"),
            field!("transport_mode", "Transport Mode", [(MISTRAL, None), (QWEN_32B, Some("ModeOfTransport"))]),
            field!("transport_mode_id", "Transport Mode ID"),
            field!("domestic_source_place", "Domestic Source Place", [(MISTRAL, Some("origin_country")), (QWEN_32B, Some("CountryOfOrigin"))]),
            field!("domestic_source_place_id", "Domestic Source Place ID"),
            field!("wrapping_type", "Wrapping Type", [(MISTRAL, None), (QWEN_32B, Some("PackingType"))]),
            field!("wrapping_type_id", "Wrapping Type ID"),
        ],
    },
    FieldGroup {
        name: "logistics",
        fields: &[
            field!("trading_country", "Trading Country", [(MISTRAL, Some("origin_country")), (QWEN_32B, Some("CountryOfOrigin"))]),
            field!("trading_country_id", "Trading Country ID"),
            field!("destination_country", "Destination Country", [(MISTRAL, Some("destination_country")), (QWEN_32B, Some("CountryOfDestination"))]),
            field!("destination_country_id", "Destination Country ID"),
            field!("destination_port", "Destination Port", [(MISTRAL, None), (QWEN_32B, Some("PortOfDischarge"))]),
            field!("destination_port_id", "Destination Port ID"),
            field!("transport_tool_id", "Transport Tool ID", [(MISTRAL, None), (QWEN_32B, Some("TransportNo"))]),
            field!("bill_of_lading_no", "Bill of Lading No.", [(MISTRAL, None), (QWEN_32B, None)]),
        ],
    },
    FieldGroup {
        name: ITEMS_GROUP,
        fields: &[
            field!("line_no", "Line No.", [(QWEN_32B, None)]),
            field!("hs_code", "HS Code", [(MISTRAL, Some("goods_code")), (QWEN_32B, Some("CommodityCode"))]),
            field!("product_name_cn", "Product Name (CN)", [(MISTRAL, Some("goods_description")), (QWEN_32B, Some("CommodityName"))]),
            field!("specification", "Specification", [(MISTRAL, None), (QWEN_32B, Some("MarkingAndNumbering"))]),
            field!("quantity", "Quantity", [(MISTRAL, Some("quantity")), (QWEN_32B, Some("Quantity"))]),
            field!("unit", "Unit", [(MISTRAL, None), (QWEN_32B, None)]),
            field!("unit_price", "Unit Price", [(MISTRAL, Some("unit_price")), (QWEN_32B, Some("UnitPrice"))]),
            field!("total_price", "Total Price", [(MISTRAL, Some("total_price")), (QWEN_32B, Some("TotalPrice"))]),
            field!("net_weight_kg", "Net Weight (kg)", [(MISTRAL, Some("total_weight")), (QWEN_32B, Some("NetWeight"))]),
            field!("origin_country", "Origin Country", [(MISTRAL, Some("origin_country")), (QWEN_32B, Some("CountryOfOrigin"))]),
            field!("origin_country_id", "Origin Country ID"),
            field!("final_destination_country", "Final Destination Country"),
            field!("final_destination_country_id", "Final Destination Country ID"),
            field!("domestic_source_place", "Domestic Source Place"),
            field!("domestic_source_place_id", "Domestic Source Place ID"),
            field!("tax_mode", "Tax Mode"),
            field!("tax_mode_id", "Tax Mode ID"),
        ],
    },
    FieldGroup {
        name: "summary",
        fields: &[
            field!("total_packages", "Total Packages", [(MISTRAL, None), (QWEN_32B, Some("ContainerNo")), (QWEN_235B, Some("total_packages"))]),
            field!("gross_weight_kg", "Gross Weight (kg)", [(MISTRAL, Some("total_weight")), (QWEN_32B, Some("GrossWeight")), (QWEN_235B, Some("gross_weight_kg"))]),
            field!("net_weight_kg", "Net Weight (kg)", [(MISTRAL, Some("total_weight")), (QWEN_32B, Some("NetWeight")), (QWEN_235B, Some("net_weight_kg"))]),
        ],
    },
];

/// Chinese form label to English dotted path
pub static LABEL_TO_PATH: &[(&str, &str)] = &[
    // document info
    ("预录入编号", "document_info.pre_entry_number"),
    ("海关编号", "document_info.customs_declaration_no"),
    ("申报日期", "document_info.declaration_date"),
    ("出口日期", "document_info.export_date"),
    // parties
    ("境内发货人", "parties.consignor.name"),
    ("境外收货人", "parties.consignee"),
    ("申报单位", "parties.declaring_agent"),
    // coded attributes
    ("监管方式", "coded_attributes.trade_mode"),
    ("征免性质", "coded_attributes.levy_nature"),
    ("出境关别", "coded_attributes.customs_office"),
    ("离境口岸", "coded_attributes.exit_port"),
    ("成交方式", "coded_attributes.transaction_mode"),
    ("运输方式", "coded_attributes.transport_mode"),
    ("境内货源地", "coded_attributes.domestic_source_place"),
    ("包装种类", "coded_attributes.wrapping_type"),
    // logistics
    ("贸易国(地区)", "logistics.trading_country"),
    ("运抵国(地区)", "logistics.destination_country"),
    ("指运港", "logistics.destination_port"),
    ("运输工具名称及航次号", "logistics.transport_tool_id"),
    ("提运单号", "logistics.bill_of_lading_no"),
    // items
    ("项号", "items.line_no"),
    ("商品编号", "items.hs_code"),
    ("商品名称及规格型号", "items.product_name_and_spec"),
    ("数量及单位", "items.quantity_and_unit"),
    ("单价/总价/币制", "items.price_info"),
    ("原产国(地区)", "items.origin_country"),
    ("最终目的国(地区)", "items.final_destination_country"),
    ("征免", "items.tax_mode"),
    // summary
    ("件数", "summary.total_packages"),
    ("毛重(千克)", "summary.gross_weight_kg"),
    ("净重(千克)", "summary.net_weight_kg"),
    // other
    ("合同协议号", "other.contract_no"),
    ("备注", "other.notes"),
];

/// English path for a Chinese label
pub fn path_for_label(label: &str) -> Option<&'static str> {
    LABEL_TO_PATH
        .iter()
        .find(|(chinese, _)| *chinese == label)
        .map(|(_, path)| *path)
}

/// Chinese label for an English path. Numeric segments (`items.0.hs_code`) are ignored.
pub fn label_for_path(path: &str) -> Option<&'static str> {
    let lookup = |p: &str| {
        LABEL_TO_PATH
            .iter()
            .find(|(_, english)| *english == p)
            .map(|(chinese, _)| *chinese)
    };

    lookup(path).or_else(|| {
        let stripped = strip_indices(path);
        if stripped != path {
            lookup(&stripped)
        } else {
            None
        }
    })
}

fn strip_indices(path: &str) -> String {
    path.split('.')
        .filter(|segment| segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(".")
}

/// Absolute paths whose display name is `name`, in table order
pub fn paths_for_display_name(name: &str) -> Vec<String> {
    FIELD_GROUPS
        .iter()
        .flat_map(|group| {
            group
                .fields
                .iter()
                .filter(move |f| f.display_name.eq_ignore_ascii_case(name))
                .map(move |f| group.full_path(f))
        })
        .collect()
}

/// Label to look for on the printed form.
///
/// English paths and display names map to their Chinese label. Chinese labels
/// and unknown input come back unchanged.
pub fn document_label(input: &str) -> String {
    let input = input.trim();

    if let Some(label) = label_for_path(input) {
        return label.to_string();
    }
    if path_for_label(input).is_some() {
        return input.to_string();
    }
    if let Some(label) = paths_for_display_name(input)
        .iter()
        .find_map(|path| label_for_path(path))
    {
        return label.to_string();
    }

    if input.contains('.') {
        tracing::warn!(
            field = input,
            "English field name not found in the label mapping, using it as-is in the prompt"
        );
    }
    input.to_string()
}

/// Non-item fields with their absolute default paths, in table order
pub fn scalar_fields() -> impl Iterator<Item = (&'static FieldGroup, &'static FieldSpec, String)> {
    FIELD_GROUPS
        .iter()
        .filter(|group| !group.is_items())
        .flat_map(|group| {
            group
                .fields
                .iter()
                .map(move |field| (group, field, group.full_path(field)))
        })
}

/// Fields of the per-item group
pub fn item_fields() -> &'static [FieldSpec] {
    FIELD_GROUPS
        .iter()
        .find(|group| group.is_items())
        .map(|group| group.fields)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_label_table_is_consistent() {
        assert_eq!(LABEL_TO_PATH.len(), 33);
        for (label, path) in LABEL_TO_PATH {
            assert_eq!(path_for_label(label), Some(*path));
            assert_eq!(label_for_path(path), Some(*label));
        }
    }

    #[rstest]
    #[case("parties.consignor.name", "境内发货人")]
    #[case("logistics.destination_port", "指运港")]
    #[case("items.0.hs_code", "商品编号")]
    #[case("items.12.tax_mode", "征免")]
    #[case("境外收货人", "境外收货人")]
    #[case("Consignor Name", "境内发货人")]
    #[case("Gross Weight (kg)", "毛重(千克)")]
    #[case("Net Weight (kg)", "净重(千克)")]
    #[case("Trade Mode ID", "Trade Mode ID")]
    #[case("document_info.unknown_field", "document_info.unknown_field")]
    #[case("发票号", "发票号")]
    fn test_document_label(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(document_label(input), expected);
    }

    #[test]
    fn test_path_for_applies_overrides() {
        let consignor = FIELD_GROUPS[1].fields[0];
        assert_eq!(
            consignor.path_for("mistral-small3.2_latest", "parties.consignor.name"),
            Some("declaration_company")
        );
        assert_eq!(
            consignor.path_for("gemini-2.5-pro", "parties.consignor.name"),
            Some("parties.consignor.name")
        );

        let trade_mode = FIELD_GROUPS[2].fields[0];
        assert_eq!(trade_mode.path, "trade_mode");
        assert_eq!(
            trade_mode.path_for("mistral-small3.2_latest", "coded_attributes.trade_mode"),
            None
        );
        assert_eq!(trade_mode.override_for("mistral-small3.2_latest"), Some(None));
        assert_eq!(trade_mode.override_for("other"), None);
    }

    #[test]
    fn test_group_order_and_items() {
        let names: Vec<&str> = FIELD_GROUPS.iter().map(|g| g.name).collect();
        assert_eq!(
            names,
            vec![
                "document_info",
                "parties",
                "coded_attributes",
                "logistics",
                "items",
                "summary"
            ]
        );
        assert_eq!(item_fields().len(), 17);
        assert!(scalar_fields().all(|(group, _, _)| !group.is_items()));

        let (_, first, path) = scalar_fields().next().unwrap();
        assert_eq!(first.display_name, "Document Type");
        assert_eq!(path, "document_info.document_type");
    }

    #[test]
    fn test_strip_indices() {
        assert_eq!(strip_indices("items.3.unit"), "items.unit");
        assert_eq!(strip_indices("parties.consignee"), "parties.consignee");
    }
}
