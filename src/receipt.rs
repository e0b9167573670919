// 🖨️ Receipts - Printable HTML for a saved day
// One row per denomination in display order, then a TOTAL ($) row.

use crate::catalog::{format_dollars, DenominationCatalog};
use crate::ledger::Ledger;
use crate::record::{ChangeBoxRecord, DailyRecord, RecordMeta, TillDayRecord, TillRecord};

pub const TILL_HEADERS: [&str; 5] = ["Dénomination", "OPEN", "CLOSE", "RETRAIT", "RESTANT"];
pub const CHANGE_BOX_HEADERS: [&str; 5] = [
    "Dénomination",
    "Boîte (avant)",
    "Dépôt",
    "Change retiré",
    "Boîte (après)",
];

#[derive(Debug, Clone)]
pub struct ReceiptTable {
    pub caption: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReceiptTable {
    /// Denomination rows for a set of ledger columns, plus the TOTAL row
    pub fn from_columns(
        caption: Option<String>,
        headers: &[&str],
        columns: &[&Ledger],
        catalog: &DenominationCatalog,
    ) -> Self {
        let mut rows: Vec<Vec<String>> = catalog
            .iter()
            .map(|d| {
                let mut row = vec![d.label.clone()];
                row.extend(columns.iter().map(|ledger| ledger.get(&d.id).to_string()));
                row
            })
            .collect();

        let mut total = vec!["TOTAL ($)".to_string()];
        total.extend(columns.iter().map(|ledger| format_dollars(ledger.total(catalog))));
        rows.push(total);

        ReceiptTable {
            caption,
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = "body{font-family:Arial,sans-serif;padding:18px;color:#111}\
.top{display:flex;justify-content:space-between;gap:16px}\
.meta{font-size:13px;opacity:.95}\
table{width:100%;border-collapse:collapse;font-size:13px;margin-top:14px}\
th,td{border:1px solid #222;padding:6px}\
th{background:#f0f0f0;font-weight:900}\
td.n{text-align:center}\
.btnbar{margin-top:12px}\
button{padding:10px 14px;border-radius:10px;border:1px solid #bbb;background:#fff;cursor:pointer;font-weight:700}\
@media print{.btnbar{display:none} body{padding:0}}";

/// Generic receipt page
pub fn render_receipt(title: &str, meta: &[(String, String)], tables: &[ReceiptTable]) -> String {
    let meta_html: String = meta
        .iter()
        .map(|(k, v)| format!("<div><b>{}:</b> {}</div>", escape_html(k), escape_html(v)))
        .collect();

    let mut tables_html = String::new();
    for table in tables {
        if let Some(caption) = &table.caption {
            tables_html.push_str(&format!("<h3>{}</h3>", escape_html(caption)));
        }
        let thead: String = table
            .headers
            .iter()
            .map(|h| format!("<th>{}</th>", escape_html(h)))
            .collect();
        let tbody: String = table
            .rows
            .iter()
            .map(|row| {
                let cells: String = row
                    .iter()
                    .enumerate()
                    .map(|(i, cell)| {
                        if i == 0 {
                            format!("<td><b>{}</b></td>", escape_html(cell))
                        } else {
                            format!("<td class=\"n\"><b>{}</b></td>", escape_html(cell))
                        }
                    })
                    .collect();
                format!("<tr>{}</tr>", cells)
            })
            .collect();
        tables_html.push_str(&format!(
            "<table><thead><tr>{}</tr></thead><tbody>{}</tbody></table>",
            thead, tbody
        ));
    }

    format!(
        "<html><head><meta charset=\"utf-8\"/><title>{title}</title><style>{style}</style></head>\
<body><div class=\"top\"><div><h2 style=\"margin:0\">{title}</h2>\
<div style=\"opacity:.7;font-size:12px\">Imprime avec le bouton.</div></div>\
<div class=\"meta\">{meta}</div></div>\
<div class=\"btnbar\"><button onclick=\"window.print()\">Imprimer</button></div>\
{tables}</body></html>",
        title = escape_html(title),
        style = STYLE,
        meta = meta_html,
        tables = tables_html,
    )
}

fn common_meta(meta: &RecordMeta) -> Vec<(String, String)> {
    vec![
        ("Type".to_string(), meta.kind.as_str().to_string()),
        ("Date".to_string(), meta.date.to_string()),
        (
            "Généré à".to_string(),
            meta.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ),
        ("Caisse #".to_string(), meta.register.to_string()),
        ("Caissier(ère)".to_string(), meta.cashier.clone()),
    ]
}

fn till_table(caption: Option<String>, day: &TillDayRecord, catalog: &DenominationCatalog) -> ReceiptTable {
    ReceiptTable::from_columns(
        caption,
        &TILL_HEADERS,
        &[&day.open, &day.close, &day.withdrawal, &day.restant],
        catalog,
    )
}

pub fn till_receipt(record: &TillRecord, catalog: &DenominationCatalog) -> String {
    let mut meta = common_meta(record.meta());
    meta.push(("Cible $".to_string(), record.target_dollars.to_string()));
    meta.push(("Mode".to_string(), record.mode.as_str().to_string()));

    let mut tables = Vec::new();
    if let Some(yesterday) = &record.yesterday {
        tables.push(till_table(Some("Hier (fermeture manquée)".to_string()), yesterday, catalog));
        tables.push(till_table(Some("Aujourd'hui".to_string()), &record.today, catalog));
    } else {
        tables.push(till_table(None, &record.today, catalog));
    }

    render_receipt("Reçu — Caisse", &meta, &tables)
}

pub fn change_box_receipt(record: &ChangeBoxRecord, catalog: &DenominationCatalog) -> String {
    let mut meta = common_meta(record.meta());
    meta.push((
        "Dépôt total ($)".to_string(),
        format_dollars(record.deposit.total(catalog)),
    ));

    let table = ReceiptTable::from_columns(
        None,
        &CHANGE_BOX_HEADERS,
        &[&record.before, &record.deposit, &record.withdrawn, &record.after],
        catalog,
    );

    render_receipt("Reçu — Boîte (Échange)", &meta, &[table])
}

// ============================================================================
// TESTS
// ============================================================================
