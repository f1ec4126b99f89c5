//! Human-readable names of CRM field codes

/// Labels of deal row and catalog field codes, as shown in the `Поля` sheet
pub const FIELD_LABELS: &[(&str, &str)] = &[
    ("PRODUCT_ID", "ID товара в каталоге"),
    ("PRODUCT_NAME", "Название товара (в сделке)"),
    ("PROPERTY_216", "Цена закупа"),
    ("QUANTITY", "Количество"),
    ("PROPERTY_228", "Поставщик"),
    ("PROPERTY_236", "Ставка НДС/входящий"),
    ("PROPERTY_234", "Артикул поставщика"),
    ("PROPERTY_206", "Ссылка на товар"),
    ("PROPERTY_200", "Наценка"),
    ("PRICE", "Цена в сделке"),
    ("TAX_RATE", "Ставка налога (%)"),
    ("TAX_INCLUDED", "Налог включён в цену"),
    ("MEASURE_NAME", "Единица измерения"),
    ("PROPERTY_214", "Объём, м³"),
    ("PROPERTY_232", "Вес,г"),
    ("PROPERTY_270", "Высота, мм"),
    ("PROPERTY_268", "Ширина, мм"),
    ("PROPERTY_266", "Длина, мм"),
    ("PROPERTY_238", "Срок отгрузки"),
    ("PROPERTY_242", "Бронирование от производителя"),
    ("PROPERTY_244", "Реестр Минпрома (Да/Нет)"),
    ("PROPERTY_204", "Страна производства"),
    ("PROPERTY_212", "Реестровая запись в Минпроме"),
    ("PROPERTY_262", "Наличие ограничений по поставке"),
    ("PROPERTY_260", "Классификация по ЕАЭС (ТН ВЭД ЕАЭС)"),
    ("PROPERTY_272", "РРЦ"),
    ("PROPERTY_258", "Производитель"),
    ("PROPERTY_256", "Техническое задание (ТЗ) с защитой позиции"),
    ("PROPERTY_254", "Приказ 838"),
    ("PROPERTY_252", "Номер ГОСТ / ТУ / СТО"),
    ("PROPERTY_250", "Сертификаты / Декларации соответствия"),
    ("PROPERTY_248", "Код КТРУ"),
    ("PROPERTY_246", "Код ОКПД2"),
    ("PRODUCT_DESCRIPTION", "Описание товара"),
    ("PROPERTY_194", "Техническое описание"),
    ("SORT", "Сортировка"),
    ("XML_ID", "Внешний ID (XML_ID)"),
    ("TYPE", "Тип строки"),
    ("STORE_ID", "ID склада"),
    ("RESERVE_ID", "ID резерва"),
    ("DATE_RESERVE_END", "Дата окончания резерва"),
    ("RESERVE_QUANTITY", "Зарезервированное количество"),
    ("ID", "ID строки товара"),
    ("OWNER_ID", "ID сделки"),
    ("OWNER_TYPE", "Тип владельца"),
    ("ORIGINAL_PRODUCT_NAME", "Оригинальное название"),
    ("PRICE_EXCLUSIVE", "Цена без скидок"),
    ("PRICE_NETTO", "Цена нетто"),
    ("PRICE_BRUTTO", "Цена брутто"),
    ("PRICE_ACCOUNT", "Бухгалтерская цена"),
    ("DISCOUNT_TYPE_ID", "Тип скидки"),
    ("DISCOUNT_RATE", "Размер скидки (%)"),
    ("DISCOUNT_SUM", "Сумма скидки"),
    ("CUSTOMIZED", "Изменено вручную"),
    ("MEASURE_CODE", "Код единицы измерения"),
    ("NAME", "Название товара (каталог)"),
    ("CODE", "Символьный код"),
    ("ACTIVE", "Активен"),
    ("CATALOG_ID", "ID каталога"),
    ("SECTION_ID", "ID раздела"),
    ("DESCRIPTION", "Описание (каталог)"),
    ("VAT_ID", "Ставка НДС"),
    ("VAT_INCLUDED", "НДС включён"),
    ("DESCRIPTION_TYPE", "Тип описания"),
    ("CURRENCY_ID", "Валюта"),
    ("MEASURE", "Единица измерения (каталог)"),
    ("PREVIEW_PICTURE", "Превью изображение"),
    ("DETAIL_PICTURE", "Детальное изображение"),
    ("TIMESTAMP_X", "Дата изменения"),
    ("DATE_CREATE", "Дата создания"),
    ("MODIFIED_BY", "Изменил"),
    ("CREATED_BY", "Создал"),
    ("PROPERTY_108", "Картинка товара"),
    ("PROPERTY_218", "ООО с НДС"),
    ("PROPERTY_220", "ИП без НДС"),
    ("PROPERTY_240", "Актуальная цена"),
    ("PROPERTY_202", "Дата расчета"),
];

/// Labels of the deal fields listed on the `Сделка` sheet
pub const DEAL_FIELDS: &[(&str, &str)] = &[
    ("ID", "ID сделки"),
    ("TITLE", "Название сделки"),
    ("STAGE_ID", "Стадия"),
    ("OPPORTUNITY", "Сумма"),
    ("CURRENCY_ID", "Валюта"),
    ("BEGINDATE", "Дата начала"),
    ("CLOSEDATE", "Дата завершения"),
    ("ASSIGNED_BY_ID", "Ответственный"),
    ("CONTACT_ID", "Контакт"),
    ("COMPANY_ID", "Компания"),
];

/// Label of a field code.
///
/// Dump columns carry a `DEAL_` or `CATALOG_` prefix, which is ignored.
/// Catalog properties (`property206`) share labels with deal row
/// properties (`PROPERTY_206`).
pub fn field_label(code: &str) -> Option<&'static str> {
    let bare = code
        .strip_prefix("DEAL_")
        .or_else(|| code.strip_prefix("CATALOG_"))
        .unwrap_or(code);

    lookup(FIELD_LABELS, bare).or_else(|| {
        let n = bare.strip_prefix("property")?;
        if n.is_empty() || !n.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        lookup(FIELD_LABELS, &format!("PROPERTY_{}", n))
    })
}

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, label)| *label)
}

/// Label of a deal field (`TITLE` → `Название сделки`)
pub fn deal_field_label(code: &str) -> Option<&'static str> {
    lookup(DEAL_FIELDS, code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(field_label("PRICE"), Some("Цена в сделке"));
        assert_eq!(field_label("DEAL_PROPERTY_206"), Some("Ссылка на товар"));
        assert_eq!(field_label("CATALOG_property232"), Some("Вес,г"));
        assert_eq!(field_label("CATALOG_propertyX"), None);
        assert_eq!(field_label("UNKNOWN"), None);
        assert_eq!(deal_field_label("TITLE"), Some("Название сделки"));
    }
}
