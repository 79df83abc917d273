//! Declarative selector tables. Kept as data rather than inline string
//! literals scattered through the plugin logic, so a new tenant's quirks
//! can usually be absorbed with a table tweak instead of new code.

#[derive(Debug, Clone)]
pub struct LoginSelectors {
    pub email_input: String,
    pub password_input: String,
    pub submit_button: String,
    pub error_banner: String,
}

#[derive(Debug, Clone)]
pub struct ProcessSelectors {
    pub listing_row: String,
    pub listing_number_cell: String,
    pub listing_link: String,
    pub access_banner: String,
    pub restricted_marker_attr: String,
    pub authority_cell: String,
    pub document_table_ready: String,
}

#[derive(Debug, Clone)]
pub struct DocumentSelectors {
    pub document_row: String,
    pub document_number_cell: String,
    pub document_type_cell: String,
    pub document_date_cell: String,
    pub document_signer_cell: String,
    pub download_link: String,
}

/// The selector table shared by every 4.x version, overridden per-version
/// only where a specific release diverges.
#[derive(Debug, Clone)]
pub struct V4Selectors {
    pub login: LoginSelectors,
    pub process: ProcessSelectors,
    pub document: DocumentSelectors,
}

impl Default for V4Selectors {
    fn default() -> Self {
        Self {
            login: LoginSelectors {
                email_input: "#txtEmail".to_string(),
                password_input: "#txtSenha".to_string(),
                submit_button: "#btnEntrar".to_string(),
                error_banner: ".alert-danger".to_string(),
            },
            process: ProcessSelectors {
                listing_row: "table.processos tbody tr".to_string(),
                listing_number_cell: "td.numero-processo".to_string(),
                listing_link: "a.abrir-processo".to_string(),
                access_banner: ".acesso-restrito-banner".to_string(),
                restricted_marker_attr: "data-acesso".to_string(),
                authority_cell: ".orgao-julgador".to_string(),
                document_table_ready: "table.documentos".to_string(),
            },
            document: DocumentSelectors {
                document_row: "table.documentos tbody tr".to_string(),
                document_number_cell: "td.numero-documento".to_string(),
                document_type_cell: "td.tipo-documento".to_string(),
                document_date_cell: "td.data-documento".to_string(),
                document_signer_cell: "td.assinante".to_string(),
                download_link: "a.baixar-documento".to_string(),
            },
        }
    }
}
