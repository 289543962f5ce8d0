//! AMS record model
//!
//! The engine loads eleven kinds of manifest records, one staging table per
//! kind. Each kind carries a fixed column layout mirroring the flat-file
//! record type; the first column of every layout is the manifest
//! `identifier` that correlates related records across tables (container
//! rows to their header row, and so on).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The record kinds the engine knows how to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Header,
    Consignee,
    Shipper,
    NotifyParty,
    BillGen,
    MarksNumbers,
    CargoDesc,
    Tariff,
    Container,
    HazmatClass,
    Hazmat,
}

impl FileKind {
    /// All known record kinds
    pub const ALL: [FileKind; 11] = [
        FileKind::Header,
        FileKind::Consignee,
        FileKind::Shipper,
        FileKind::NotifyParty,
        FileKind::BillGen,
        FileKind::MarksNumbers,
        FileKind::CargoDesc,
        FileKind::Tariff,
        FileKind::Container,
        FileKind::HazmatClass,
        FileKind::Hazmat,
    ];

    /// Staging table this kind loads into
    pub fn table(&self) -> &'static str {
        match self {
            FileKind::Header => "ams_header_load",
            FileKind::Consignee => "ams_consignee_load",
            FileKind::Shipper => "ams_shipper_load",
            FileKind::NotifyParty => "ams_notifyparty_load",
            FileKind::BillGen => "ams_billgen_load",
            FileKind::MarksNumbers => "ams_marksnumbers_load",
            FileKind::CargoDesc => "ams_cargodesc_load",
            FileKind::Tariff => "ams_tariff_load",
            FileKind::Container => "ams_container_load",
            FileKind::HazmatClass => "ams_hazmatclass_load",
            FileKind::Hazmat => "ams_hazmat_load",
        }
    }

    /// Name of the per-entity revision column in the staging table
    pub fn revision_column(&self) -> &'static str {
        match self {
            FileKind::Header => "header_revision",
            FileKind::Consignee => "consignee_revision",
            FileKind::Shipper => "shipper_revision",
            FileKind::NotifyParty => "notifyparty_revision",
            FileKind::BillGen => "billgen_revision",
            FileKind::MarksNumbers => "marksnumbers_revision",
            FileKind::CargoDesc => "cargodesc_revision",
            FileKind::Tariff => "tariff_revision",
            FileKind::Container => "container_revision",
            FileKind::HazmatClass => "hazmatclass_revision",
            FileKind::Hazmat => "hazmat_revision",
        }
    }

    /// Column layout for this kind's flat-file records
    pub fn layout(&self) -> &'static RecordLayout {
        match self {
            FileKind::Header => &HEADER_LAYOUT,
            FileKind::Consignee => &CONSIGNEE_LAYOUT,
            FileKind::Shipper => &SHIPPER_LAYOUT,
            FileKind::NotifyParty => &NOTIFYPARTY_LAYOUT,
            FileKind::BillGen => &BILLGEN_LAYOUT,
            FileKind::MarksNumbers => &MARKSNUMBERS_LAYOUT,
            FileKind::CargoDesc => &CARGODESC_LAYOUT,
            FileKind::Tariff => &TARIFF_LAYOUT,
            FileKind::Container => &CONTAINER_LAYOUT,
            FileKind::HazmatClass => &HAZMATCLASS_LAYOUT,
            FileKind::Hazmat => &HAZMAT_LAYOUT,
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FileKind::Header => "header",
            FileKind::Consignee => "consignee",
            FileKind::Shipper => "shipper",
            FileKind::NotifyParty => "notifyparty",
            FileKind::BillGen => "billgen",
            FileKind::MarksNumbers => "marksnumbers",
            FileKind::CargoDesc => "cargodesc",
            FileKind::Tariff => "tariff",
            FileKind::Container => "container",
            FileKind::HazmatClass => "hazmatclass",
            FileKind::Hazmat => "hazmat",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for FileKind {
    type Err = anyhow::Error;

    /// Accepts both the short kind name ("container") and the staging
    /// table name ("ams_container_load").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "header" | "ams_header_load" => Ok(FileKind::Header),
            "consignee" | "ams_consignee_load" => Ok(FileKind::Consignee),
            "shipper" | "ams_shipper_load" => Ok(FileKind::Shipper),
            "notifyparty" | "ams_notifyparty_load" => Ok(FileKind::NotifyParty),
            "billgen" | "ams_billgen_load" => Ok(FileKind::BillGen),
            "marksnumbers" | "ams_marksnumbers_load" => Ok(FileKind::MarksNumbers),
            "cargodesc" | "ams_cargodesc_load" => Ok(FileKind::CargoDesc),
            "tariff" | "ams_tariff_load" => Ok(FileKind::Tariff),
            "container" | "ams_container_load" => Ok(FileKind::Container),
            "hazmatclass" | "ams_hazmatclass_load" => Ok(FileKind::HazmatClass),
            "hazmat" | "ams_hazmat_load" => Ok(FileKind::Hazmat),
            _ => Err(anyhow::anyhow!("Unknown file kind: {}", s)),
        }
    }
}

/// Declared data type of a flat-file column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Text,
    Integer,
    Decimal,
    Date,
    Boolean,
}

impl DataType {
    /// Convert a raw field into a typed value
    ///
    /// Empty input becomes `Null`; dates use the `%Y-%m-%d` interchange
    /// format; booleans accept true/1/yes/y (case-insensitive).
    pub fn convert(&self, raw: &str) -> Result<FieldValue, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(FieldValue::Null);
        }

        match self {
            DataType::Text => Ok(FieldValue::Text(trimmed.to_string())),
            DataType::Integer => trimmed
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| format!("invalid integer: {:?}", trimmed)),
            DataType::Decimal => trimmed
                .parse::<f64>()
                .map(FieldValue::Decimal)
                .map_err(|_| format!("invalid decimal: {:?}", trimmed)),
            DataType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(FieldValue::Date)
                .map_err(|_| format!("invalid date (expected YYYY-MM-DD): {:?}", trimmed)),
            DataType::Boolean => {
                let v = matches!(trimmed.to_lowercase().as_str(), "true" | "1" | "yes" | "y");
                Ok(FieldValue::Boolean(v))
            },
        }
    }
}

/// A typed field value decoded from a flat-file record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Date(NaiveDate),
    Boolean(bool),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Text content, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One column of a record layout
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub data_type: DataType,
    pub required: bool,
}

const fn col(name: &'static str, data_type: DataType, required: bool) -> ColumnSpec {
    ColumnSpec {
        name,
        data_type,
        required,
    }
}

/// Fixed column layout of one record kind
#[derive(Debug)]
pub struct RecordLayout {
    pub columns: &'static [ColumnSpec],
}

impl RecordLayout {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }
}

static HEADER_LAYOUT: RecordLayout = RecordLayout {
    columns: &[
        col("identifier", DataType::Text, true),
        col("carrier_scac", DataType::Text, false),
        col("vessel_name", DataType::Text, false),
        col("voyage_number", DataType::Text, false),
        col("port_of_lading", DataType::Text, false),
        col("port_of_unlading", DataType::Text, false),
        col("place_of_receipt", DataType::Text, false),
        col("estimated_arrival_date", DataType::Date, false),
        col("actual_arrival_date", DataType::Date, false),
        col("manifest_quantity", DataType::Integer, false),
        col("manifest_unit", DataType::Text, false),
        col("weight", DataType::Decimal, false),
        col("weight_unit", DataType::Text, false),
    ],
};

static CONSIGNEE_LAYOUT: RecordLayout = RecordLayout {
    columns: &[
        col("identifier", DataType::Text, true),
        col("consignee_name", DataType::Text, true),
        col("address_line_1", DataType::Text, false),
        col("address_line_2", DataType::Text, false),
        col("city", DataType::Text, false),
        col("state_province", DataType::Text, false),
        col("zip_code", DataType::Text, false),
        col("country_code", DataType::Text, false),
        col("contact_name", DataType::Text, false),
        col("telephone_number", DataType::Text, false),
    ],
};

static SHIPPER_LAYOUT: RecordLayout = RecordLayout {
    columns: &[
        col("identifier", DataType::Text, true),
        col("shipper_name", DataType::Text, true),
        col("address_line_1", DataType::Text, false),
        col("address_line_2", DataType::Text, false),
        col("city", DataType::Text, false),
        col("state_province", DataType::Text, false),
        col("zip_code", DataType::Text, false),
        col("country_code", DataType::Text, false),
        col("contact_name", DataType::Text, false),
        col("telephone_number", DataType::Text, false),
    ],
};

static NOTIFYPARTY_LAYOUT: RecordLayout = RecordLayout {
    columns: &[
        col("identifier", DataType::Text, true),
        col("notify_party_name", DataType::Text, true),
        col("address_line_1", DataType::Text, false),
        col("address_line_2", DataType::Text, false),
        col("city", DataType::Text, false),
        col("state_province", DataType::Text, false),
        col("zip_code", DataType::Text, false),
        col("country_code", DataType::Text, false),
        col("contact_name", DataType::Text, false),
        col("telephone_number", DataType::Text, false),
    ],
};

static BILLGEN_LAYOUT: RecordLayout = RecordLayout {
    columns: &[
        col("identifier", DataType::Text, true),
        col("master_bol_number", DataType::Text, false),
        col("house_bol_number", DataType::Text, false),
        col("sub_house_bol_number", DataType::Text, false),
        col("voyage_number", DataType::Text, false),
        col("bill_type_code", DataType::Text, false),
        col("manifest_number", DataType::Integer, false),
        col("port_of_destination", DataType::Text, false),
        col("foreign_port_of_destination", DataType::Text, false),
    ],
};

static MARKSNUMBERS_LAYOUT: RecordLayout = RecordLayout {
    columns: &[
        col("identifier", DataType::Text, true),
        col("container_number", DataType::Text, false),
        col("marks_sequence_number", DataType::Integer, false),
        col("marks_and_numbers", DataType::Text, false),
    ],
};

static CARGODESC_LAYOUT: RecordLayout = RecordLayout {
    columns: &[
        col("identifier", DataType::Text, true),
        col("container_number", DataType::Text, false),
        col("description_sequence_number", DataType::Integer, false),
        col("piece_count", DataType::Integer, false),
        col("description_text", DataType::Text, false),
    ],
};

static TARIFF_LAYOUT: RecordLayout = RecordLayout {
    columns: &[
        col("identifier", DataType::Text, true),
        col("container_number", DataType::Text, false),
        col("description_sequence_number", DataType::Integer, false),
        col("harmonized_number", DataType::Text, false),
        col("harmonized_value", DataType::Decimal, false),
        col("harmonized_weight", DataType::Decimal, false),
        col("harmonized_weight_unit", DataType::Text, false),
    ],
};

static CONTAINER_LAYOUT: RecordLayout = RecordLayout {
    columns: &[
        col("identifier", DataType::Text, true),
        col("container_number", DataType::Text, true),
        col("seal_number_1", DataType::Text, false),
        col("seal_number_2", DataType::Text, false),
        col("equipment_description_code", DataType::Text, false),
        col("container_length", DataType::Integer, false),
        col("container_height", DataType::Integer, false),
        col("container_width", DataType::Integer, false),
        col("container_type", DataType::Text, false),
        col("load_status", DataType::Text, false),
        col("type_of_service", DataType::Text, false),
    ],
};

static HAZMATCLASS_LAYOUT: RecordLayout = RecordLayout {
    columns: &[
        col("identifier", DataType::Text, true),
        col("container_number", DataType::Text, false),
        col("hazmat_sequence_number", DataType::Integer, false),
        col("hazmat_classification", DataType::Text, false),
    ],
};

static HAZMAT_LAYOUT: RecordLayout = RecordLayout {
    columns: &[
        col("identifier", DataType::Text, true),
        col("container_number", DataType::Text, false),
        col("hazmat_sequence_number", DataType::Integer, false),
        col("hazmat_code", DataType::Text, false),
        col("hazmat_code_qualifier", DataType::Text, false),
        col("hazmat_class", DataType::Text, false),
        col("hazmat_description", DataType::Text, false),
        col("hazmat_contact", DataType::Text, false),
        col("hazmat_page_number", DataType::Text, false),
        col("hazmat_flash_point_temperature", DataType::Decimal, false),
        col("hazmat_flash_point_temperature_negative_ind", DataType::Boolean, false),
        col("hazmat_flash_point_temperature_unit", DataType::Text, false),
    ],
};

/// A decoded record awaiting staging
///
/// Values are positionally aligned with the kind's [`RecordLayout`].
#[derive(Debug, Clone, PartialEq)]
pub struct StagingRow {
    pub values: Vec<FieldValue>,
}

impl StagingRow {
    pub fn new(values: Vec<FieldValue>) -> Self {
        Self { values }
    }

    /// The manifest identifier correlating this row with its header
    pub fn identifier(&self) -> Option<&str> {
        self.values.first().and_then(|v| v.as_text())
    }
}
