// Diesel table definitions for the inspection store.
// Kept in sync with the DDL in db.rs by hand.

diesel::table! {
    users (user_id) {
        user_id -> Integer,
        username -> Text,
        password_hash -> Text,
        role -> Text,
        full_name -> Nullable<Text>,
        email -> Nullable<Text>,
        created_at -> Nullable<Text>,
    }
}

diesel::table! {
    smartphones (smartphone_id) {
        smartphone_id -> Integer,
        model_name -> Text,
        manufacturer -> Text,
        screen_size -> Nullable<Double>,
        resolution -> Nullable<Text>,
        created_at -> Nullable<Text>,
    }
}

diesel::table! {
    inspections (inspection_id) {
        inspection_id -> Integer,
        smartphone_id -> Nullable<Integer>,
        inspector_id -> Nullable<Integer>,
        inspection_date -> Nullable<Text>,
        status -> Nullable<Text>,
        overall_result -> Nullable<Text>,
        notes -> Nullable<Text>,
        image_path -> Nullable<Text>,
    }
}

diesel::table! {
    defects (defect_id) {
        defect_id -> Integer,
        inspection_id -> Nullable<Integer>,
        defect_type -> Nullable<Text>,
        severity -> Nullable<Integer>,
        location_x -> Nullable<Integer>,
        location_y -> Nullable<Integer>,
        size -> Nullable<Double>,
        description -> Nullable<Text>,
        detected_at -> Nullable<Text>,
    }
}

diesel::table! {
    defect_images (image_id) {
        image_id -> Integer,
        defect_id -> Nullable<Integer>,
        image_path -> Text,
        thumbnail_path -> Nullable<Text>,
        uploaded_at -> Nullable<Text>,
    }
}

diesel::joinable!(inspections -> smartphones (smartphone_id));
diesel::joinable!(inspections -> users (inspector_id));
diesel::joinable!(defects -> inspections (inspection_id));
diesel::joinable!(defect_images -> defects (defect_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    smartphones,
    inspections,
    defects,
    defect_images,
);
