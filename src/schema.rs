// Kept in sync with `repository/schema_sqlite.sql`.

diesel::table! {
    organizations (id) {
        id -> Integer,
        registered_organisation_title -> Text,
        search_title -> Text,
        category -> Text,
    }
}

diesel::table! {
    urls (id) {
        id -> Integer,
        organization_id -> Integer,
        url -> Text,
        file_path -> Text,
        download_status -> Text,
        file_type -> Nullable<Text>,
        paywall_status -> Nullable<Text>,
        updated_at -> Nullable<Text>,
    }
}

diesel::table! {
    html_text (id) {
        id -> Integer,
        organization_id -> Integer,
        html_file -> Text,
        extracted_text_path -> Nullable<Text>,
        extract_status -> Text,
        updated_at -> Nullable<Text>,
    }
}

diesel::table! {
    pdf_text (id) {
        id -> Integer,
        organization_id -> Integer,
        pdf_file -> Text,
        extracted_text_path -> Nullable<Text>,
        extract_status -> Text,
        updated_at -> Nullable<Text>,
    }
}

diesel::joinable!(urls -> organizations (organization_id));
diesel::joinable!(html_text -> organizations (organization_id));
diesel::joinable!(pdf_text -> organizations (organization_id));

diesel::allow_tables_to_appear_in_same_query!(organizations, urls, html_text, pdf_text,);
