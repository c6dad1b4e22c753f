//! Normalización de nombres de ciudades
//!
//! Los destinos reales llegan digitados por operadores: con tildes, en
//! minúsculas o con espacios sobrantes. Toda comparación de ciudades del
//! motor pasa por `city_key` para que "Ibagué", "IBAGUE " y "ibague"
//! sean la misma ciudad.

/// Clave canónica de una ciudad: mayúsculas, sin tildes ni espacios extremos
pub fn city_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter_map(strip_diacritic)
        .collect::<String>()
        .to_uppercase()
}

/// Compara dos nombres de ciudad de forma canónica
pub fn same_city(a: &str, b: &str) -> bool {
    !a.trim().is_empty() && city_key(a) == city_key(b)
}

fn strip_diacritic(c: char) -> Option<char> {
    let mapped = match c {
        'á' | 'à' | 'ä' | 'â' | 'Á' | 'À' | 'Ä' | 'Â' => 'A',
        'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => 'E',
        'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
        'ó' | 'ò' | 'ö' | 'ô' | 'Ó' | 'Ò' | 'Ö' | 'Ô' => 'O',
        'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
        'ñ' | 'Ñ' => 'N',
        other => other,
    };
    Some(mapped)
}
