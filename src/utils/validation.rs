//! Utilidades de validación
//!
//! Funciones helper para validar y convertir los campos crudos que llegan
//! en las filas de ingesta. Los montos y pesos se manejan siempre como
//! `Decimal` para evitar errores de redondeo en dinero.

use num_traits::{ToPrimitive, Zero};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::utils::errors::ErrorFila;

/// Valida que un campo de texto no esté vacío
pub fn campo_requerido(fila: usize, campo: &str, valor: &str) -> Result<String, ErrorFila> {
    let limpio = valor.trim();
    if limpio.is_empty() {
        Err(ErrorFila::new(
            fila,
            Some(campo),
            format!("El campo {} es obligatorio", campo),
        ))
    } else {
        Ok(limpio.to_string())
    }
}

/// Parsea un campo numérico obligatorio a `Decimal`
pub fn parse_decimal(fila: usize, campo: &str, valor: &str) -> Result<Decimal, ErrorFila> {
    let limpio = valor.trim().replace(',', "");
    if limpio.is_empty() {
        return Err(ErrorFila::new(
            fila,
            Some(campo),
            format!("El campo {} es obligatorio", campo),
        ));
    }
    Decimal::from_str(&limpio).map_err(|_| {
        ErrorFila::new(
            fila,
            Some(campo),
            format!("El valor '{}' de {} no es numérico", valor, campo),
        )
    })
}

/// Parsea un campo numérico opcional; vacío equivale a `None`
pub fn parse_decimal_opcional(
    fila: usize,
    campo: &str,
    valor: &str,
) -> Result<Option<Decimal>, ErrorFila> {
    if valor.trim().is_empty() {
        return Ok(None);
    }
    parse_decimal(fila, campo, valor).map(Some)
}

/// Parsea un campo numérico que no puede ser negativo
pub fn parse_decimal_no_negativo(
    fila: usize,
    campo: &str,
    valor: &str,
) -> Result<Decimal, ErrorFila> {
    let parsed = parse_decimal(fila, campo, valor)?;
    if parsed < Decimal::zero() {
        return Err(ErrorFila::new(
            fila,
            Some(campo),
            format!("El campo {} no puede ser negativo", campo),
        ));
    }
    Ok(parsed)
}

/// Parsea un entero (cajas, puntos) tolerando el formato decimal de Excel
pub fn parse_entero(fila: usize, campo: &str, valor: &str) -> Result<i64, ErrorFila> {
    let decimal = parse_decimal(fila, campo, valor)?;
    if decimal.fract() != Decimal::zero() {
        return Err(ErrorFila::new(
            fila,
            Some(campo),
            format!("El campo {} debe ser un número entero", campo),
        ));
    }
    decimal.to_i64().ok_or_else(|| {
        ErrorFila::new(
            fila,
            Some(campo),
            format!("El valor de {} está fuera de rango", campo),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campo_requerido() {
        assert_eq!(campo_requerido(2, "ORIGIN", " CALI ").unwrap(), "CALI");
        assert!(campo_requerido(2, "ORIGIN", "  ").is_err());
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(
            parse_decimal(2, "NUM_KILOS", "1,250.5").unwrap(),
            Decimal::from_str("1250.5").unwrap()
        );
        assert!(parse_decimal(2, "NUM_KILOS", "abc").is_err());
        assert!(parse_decimal(2, "NUM_KILOS", "").is_err());
    }

    #[test]
    fn test_parse_decimal_opcional() {
        assert_eq!(parse_decimal_opcional(2, "NUM_KILOS_SICETAC", "").unwrap(), None);
        assert_eq!(
            parse_decimal_opcional(2, "NUM_KILOS_SICETAC", "4000").unwrap(),
            Some(Decimal::from(4000))
        );
    }

    #[test]
    fn test_parse_no_negativo() {
        assert!(parse_decimal_no_negativo(3, "DETOUR", "-5").is_err());
        assert!(parse_decimal_no_negativo(3, "DETOUR", "0").is_ok());
    }

    #[test]
    fn test_parse_entero() {
        assert_eq!(parse_entero(2, "NUM_CAJAS", "50").unwrap(), 50);
        assert_eq!(parse_entero(2, "NUM_CAJAS", "50.0").unwrap(), 50);
        assert!(parse_entero(2, "NUM_CAJAS", "50.5").is_err());
    }
}
