//! Prompt templates sent to the vision models

/// Replaced with the page text (text layer or OCR)
pub const EXTRACTED_TEXT_PLACEHOLDER: &str = "{{EXTRACTED_TEXT}}";
/// Replaced with the label being verified
pub const FIELD_NAME_PLACEHOLDER: &str = "{{FIELD_NAME}}";

/// Full-schema extraction prompt for export declarations (报关单)
pub const DECLARATION_PROMPT: &str = r#"You are a specialized trade document parser. Extract the following fields from the Export Declaration (报关单) and return the data in a strict JSON format.

Here is the text extracted from the page (may contain errors):
"""
{{EXTRACTED_TEXT}}
"""

**JSON Schema:**
{
  "document_info": {
    "document_type": "The type of document (e.g., Customs Export Declaration)",
    "customs_declaration_no": "The customs declaration number (报关单号)",
    "declaration_date": "The date of declaration (申报日期) in YYYY-MM-DD format",
    "export_date": "The date of export (出口日期) in YYYY-MM-DD format"
  },
  "parties": {
    "consignor": {
      "name": "The name of the domestic consignor (境内发货人)",
      "code": "The code of the domestic consignor"
    },
    "consignee": "The name of the overseas consignee (境外收货人)",
    "declaring_agent": "The name and code of the declaring agent (申报单位)"
  },
  "coded_attributes": {
    "trade_mode": "The trade mode (监管方式)",
    "levy_nature": "The nature of levy and exemption (征免性质)",
    "customs_office": "The customs office (备案号)",
    "exit_port": "The port of exit (出/境关别)",
    "transaction_mode": "The transaction mode (成交方式)",
    "transport_mode": "The mode of transport (运输方式)",
    "domestic_source_place": "The domestic source of goods (境内货源地)",
    "wrapping_type": "The wrapping type (包装种类)"
  },
  "logistics": {
    "trading_country": "The trading country (运抵国(地区))",
    "destination_country": "The destination country (指运港)",
    "destination_port": "The destination port (离境口岸)",
    "transport_tool_id": "The transport tool ID (运输工具名称及航次号)",
    "bill_of_lading_no": "The bill of lading number (提运单号)"
  },
  "items": [
    {
      "line_no": "The item line number",
      "hs_code": "The HS code (商品编号)",
      "product_name_cn": "The Chinese name of the product (商品名称)",
      "specification": "The product specification (规格型号)",
      "quantity": "The quantity (数量)",
      "unit": "The unit of quantity (单位)",
      "unit_price": "The unit price (单价)",
      "total_price": "The total price (总价)",
      "net_weight_kg": "The net weight in kg (净重)",
      "origin_country": "The country of origin (原产国)",
      "final_destination_country": "The final destination country (最终目的国)",
      "domestic_source_place": "The domestic source place (境内货源地)",
      "tax_mode": "The tax mode (征免)"
    }
  ],
  "summary": {
    "total_packages": "The total number of packages (件数)",
    "gross_weight_kg": "The gross weight in kg (毛重)",
    "net_weight_kg": "The net weight in kg (净重)"
  }
}

RETURN ONLY JSON. NO MARKDOWN.
"#;

const NOTIFICATION_PROMPT: &str = "You are a detailed data extractor. Parse the Customs Release Notification (通关无纸化出口放行通知书) into a strict JSON format as previously instructed. RETURN ONLY JSON. NO MARKDOWN.";

const PACKING_PROMPT: &str = "You are an inventory management assistant. Parse the Cargo List into a strict JSON format as previously instructed. RETURN ONLY JSON. NO MARKDOWN.";

/// Single-field verification prompt
pub const VERIFY_PROMPT: &str = r#"You are an expert OCR data extraction tool. Your task is to extract a single field from the provided image of a document page.

The field to extract is: '{{FIELD_NAME}}'

Here is the text extracted from the page (may contain errors):
"""
{{EXTRACTED_TEXT}}
"""

Analyze the image carefully. Return your answer as a JSON object with the following structure:
{
  "field_name": "{{FIELD_NAME}}",
  "value": "The extracted value for the field.",
  "confidence": "high|medium|low",
  "reasoning": "A brief explanation if the value is ambiguous or hard to read."
}

Return ONLY the JSON object. Do not include any other text or markdown formatting."#;

/// Kind of customs document on the requested page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum DocumentType {
    /// Export declaration (报关单)
    Declaration,
    /// Customs release notification
    Notification,
    /// Packing / cargo list
    Packing,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Declaration => "declaration",
            DocumentType::Notification => "notification",
            DocumentType::Packing => "packing",
        }
    }

    pub fn template(&self) -> &'static str {
        match self {
            DocumentType::Declaration => DECLARATION_PROMPT,
            DocumentType::Notification => NOTIFICATION_PROMPT,
            DocumentType::Packing => PACKING_PROMPT,
        }
    }

    /// Prompt with the page text filled in. Templates without the placeholder are returned as-is.
    pub fn render(&self, extracted_text: &str) -> String {
        self.template()
            .replace(EXTRACTED_TEXT_PLACEHOLDER, extracted_text)
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verification prompt for one label on the printed form
pub fn render_verify_prompt(label: &str, extracted_text: &str) -> String {
    VERIFY_PROMPT
        .replace(FIELD_NAME_PLACEHOLDER, label)
        .replace(EXTRACTED_TEXT_PLACEHOLDER, extracted_text)
}
