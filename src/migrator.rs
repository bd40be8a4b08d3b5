use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_sites_and_users::Migration),
            Box::new(m20240101_000002_create_catalog_tables::Migration),
            Box::new(m20240101_000003_create_order_tables::Migration),
        ]
    }
}

mod m20240101_000001_create_sites_and_users {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_sites_and_users"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sites::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Sites::SiteId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Sites::Code).string_len(32).not_null().unique_key())
                        .col(ColumnDef::new(Sites::Name).string().not_null())
                        .col(
                            ColumnDef::new(Sites::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Users::UserId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Users::Username).string().not_null().unique_key())
                        .col(ColumnDef::new(Users::DisplayName).string().not_null())
                        .col(ColumnDef::new(Users::PasswordHash).text().not_null())
                        .col(
                            ColumnDef::new(Users::Role)
                                .string_len(16)
                                .not_null()
                                .default("user"),
                        )
                        .col(
                            ColumnDef::new(Users::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(UserSites::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(UserSites::UserId).integer().not_null())
                        .col(ColumnDef::new(UserSites::SiteId).integer().not_null())
                        .primary_key(
                            Index::create()
                                .col(UserSites::UserId)
                                .col(UserSites::SiteId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_user_sites_user")
                                .from(UserSites::Table, UserSites::UserId)
                                .to(Users::Table, Users::UserId)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_user_sites_site")
                                .from(UserSites::Table, UserSites::SiteId)
                                .to(Sites::Table, Sites::SiteId)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(UserSites::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Sites::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Sites {
        Table,
        SiteId,
        Code,
        Name,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub enum Users {
        Table,
        UserId,
        Username,
        DisplayName,
        PasswordHash,
        Role,
        Active,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub enum UserSites {
        Table,
        UserId,
        SiteId,
    }
}

mod m20240101_000002_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Customers::CustomerId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Customers::SiteId).integer().not_null())
                        .col(ColumnDef::new(Customers::FirstName).string().not_null())
                        .col(ColumnDef::new(Customers::LastName).string().not_null())
                        .col(ColumnDef::new(Customers::Email).string().null())
                        .col(ColumnDef::new(Customers::Phone).string().null())
                        .col(ColumnDef::new(Customers::City).string().null())
                        .col(
                            ColumnDef::new(Customers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Customers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_customers_site_id")
                        .table(Customers::Table)
                        .col(Customers::SiteId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::ProductId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Products::SiteId).integer().not_null())
                        .col(ColumnDef::new(Products::Sku).string_len(64).not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(
                            ColumnDef::new(Products::UnitPriceCents)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::StockQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_products_site_sku")
                        .table(Products::Table)
                        .col(Products::SiteId)
                        .col(Products::Sku)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Customers {
        Table,
        CustomerId,
        SiteId,
        FirstName,
        LastName,
        Email,
        Phone,
        City,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum Products {
        Table,
        ProductId,
        SiteId,
        Sku,
        Name,
        UnitPriceCents,
        StockQuantity,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_order_tables"
        }
    }

    fn child_fk(
        name: &str,
        table: impl IntoIden + 'static,
        column: impl IntoIden + 'static,
    ) -> ForeignKeyCreateStatement {
        ForeignKey::create()
            .name(name)
            .from(table, column)
            .to(Orders::Table, Orders::OrderId)
            .on_delete(ForeignKeyAction::Cascade)
            .to_owned()
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Orders::OrderId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Orders::SiteId).integer().not_null())
                        .col(ColumnDef::new(Orders::OrderReference).string_len(32).not_null())
                        .col(ColumnDef::new(Orders::CustomerId).integer().null())
                        .col(ColumnDef::new(Orders::BrandId).integer().null())
                        .col(ColumnDef::new(Orders::ActionId).integer().null())
                        .col(ColumnDef::new(Orders::PaymentTypeId).integer().null())
                        .col(ColumnDef::new(Orders::PaymentId).integer().null())
                        .col(
                            ColumnDef::new(Orders::OrderDatetime)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::SubtotalCents)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::ShippingCents)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::TotalCents)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::OrderLines)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::IsPaid)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Orders::IsInvoiced)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Orders::IsAnnulled)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Orders::CreatedBy).integer().null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_orders_site_reference")
                        .table(Orders::Table)
                        .col(Orders::SiteId)
                        .col(Orders::OrderReference)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderPayments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderPayments::PaymentId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderPayments::SiteId).integer().not_null())
                        .col(ColumnDef::new(OrderPayments::OrderId).integer().not_null())
                        .col(ColumnDef::new(OrderPayments::PaymentTypeId).integer().not_null())
                        .col(
                            ColumnDef::new(OrderPayments::AmountCents)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(OrderPayments::CardLast4).string_len(4).null())
                        .col(ColumnDef::new(OrderPayments::CardExpiry).string_len(7).null())
                        .col(ColumnDef::new(OrderPayments::ChequeNumber).string().null())
                        .col(ColumnDef::new(OrderPayments::ChequeBank).string().null())
                        .col(
                            ColumnDef::new(OrderPayments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(&mut child_fk(
                            "fk_order_payments_order",
                            OrderPayments::Table,
                            OrderPayments::OrderId,
                        ))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::ItemId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderItems::SiteId).integer().not_null())
                        .col(ColumnDef::new(OrderItems::OrderId).integer().not_null())
                        .col(ColumnDef::new(OrderItems::LineNumber).integer().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).integer().null())
                        .col(ColumnDef::new(OrderItems::ProductName).string().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPriceCents)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::LineTotalCents)
                                .big_integer()
                                .not_null(),
                        )
                        .foreign_key(&mut child_fk(
                            "fk_order_items_order",
                            OrderItems::Table,
                            OrderItems::OrderId,
                        ))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderAddresses::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderAddresses::AddressId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderAddresses::SiteId).integer().not_null())
                        .col(ColumnDef::new(OrderAddresses::OrderId).integer().not_null())
                        .col(
                            ColumnDef::new(OrderAddresses::AddressType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderAddresses::Recipient).string().not_null())
                        .col(ColumnDef::new(OrderAddresses::Street).string().not_null())
                        .col(ColumnDef::new(OrderAddresses::PostalCode).string_len(16).not_null())
                        .col(ColumnDef::new(OrderAddresses::City).string().not_null())
                        .col(ColumnDef::new(OrderAddresses::Country).string().not_null())
                        .col(ColumnDef::new(OrderAddresses::Phone).string().null())
                        .foreign_key(&mut child_fk(
                            "fk_order_addresses_order",
                            OrderAddresses::Table,
                            OrderAddresses::OrderId,
                        ))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderNotes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderNotes::NoteId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderNotes::SiteId).integer().not_null())
                        .col(ColumnDef::new(OrderNotes::OrderId).integer().not_null())
                        .col(ColumnDef::new(OrderNotes::NoteText).text().not_null())
                        .col(ColumnDef::new(OrderNotes::CreatedBy).integer().null())
                        .col(
                            ColumnDef::new(OrderNotes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(&mut child_fk(
                            "fk_order_notes_order",
                            OrderNotes::Table,
                            OrderNotes::OrderId,
                        ))
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                OrderNotes::Table.into_iden(),
                OrderAddresses::Table.into_iden(),
                OrderItems::Table.into_iden(),
                OrderPayments::Table.into_iden(),
                Orders::Table.into_iden(),
            ] {
                manager
                    .drop_table(Table::drop().table(table).to_owned())
                    .await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub enum Orders {
        Table,
        OrderId,
        SiteId,
        OrderReference,
        CustomerId,
        BrandId,
        ActionId,
        PaymentTypeId,
        PaymentId,
        OrderDatetime,
        SubtotalCents,
        ShippingCents,
        TotalCents,
        OrderLines,
        IsPaid,
        IsInvoiced,
        IsAnnulled,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum OrderPayments {
        Table,
        PaymentId,
        SiteId,
        OrderId,
        PaymentTypeId,
        AmountCents,
        CardLast4,
        CardExpiry,
        ChequeNumber,
        ChequeBank,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub enum OrderItems {
        Table,
        ItemId,
        SiteId,
        OrderId,
        LineNumber,
        ProductId,
        ProductName,
        Quantity,
        UnitPriceCents,
        LineTotalCents,
    }

    #[derive(DeriveIden)]
    pub enum OrderAddresses {
        Table,
        AddressId,
        SiteId,
        OrderId,
        AddressType,
        Recipient,
        Street,
        PostalCode,
        City,
        Country,
        Phone,
    }

    #[derive(DeriveIden)]
    pub enum OrderNotes {
        Table,
        NoteId,
        SiteId,
        OrderId,
        NoteText,
        CreatedBy,
        CreatedAt,
    }
}
