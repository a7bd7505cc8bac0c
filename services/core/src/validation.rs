//! Input validation utilities

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Senha obrigatoria".to_string());
    }

    if password.len() < 8 {
        return Err("Senha deve ter pelo menos 8 caracteres".to_string());
    }

    if password.len() > 128 {
        return Err("Senha deve ter no maximo 128 caracteres".to_string());
    }

    Ok(())
}

/// Validate a device identifier
pub fn validate_device_id(device_id: &str) -> Result<(), String> {
    if device_id.trim().is_empty() {
        return Err("Identificador de dispositivo obrigatorio".to_string());
    }

    if device_id.len() > 128 {
        return Err("Identificador de dispositivo muito longo".to_string());
    }

    Ok(())
}

/// Validate GPS coordinates
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), String> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err("Latitude fora do intervalo".to_string());
    }

    if !(-180.0..=180.0).contains(&longitude) {
        return Err("Longitude fora do intervalo".to_string());
    }

    Ok(())
}

/// Validate a device-reported UTC offset in minutes. Real-world offsets run
/// from UTC-12:00 to UTC+14:00.
pub fn validate_utc_offset(offset_minutes: i32) -> Result<(), String> {
    if !(-720..=840).contains(&offset_minutes) {
        return Err("Fuso horario invalido".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_password_rejected() {
        assert!(validate_password("abc").is_err());
        assert!(validate_password("").is_err());
    }

    #[test]
    fn reasonable_password_accepted() {
        assert!(validate_password("senha-segura-123").is_ok());
    }

    #[test]
    fn blank_device_id_rejected() {
        assert!(validate_device_id("  ").is_err());
        assert!(validate_device_id("dev-01").is_ok());
    }

    #[test]
    fn out_of_range_coordinates_rejected() {
        assert!(validate_coordinates(-91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, 181.0).is_err());
        assert!(validate_coordinates(-23.55, -46.63).is_ok());
    }

    #[test]
    fn utc_offset_bounds() {
        assert!(validate_utc_offset(-180).is_ok());
        assert!(validate_utc_offset(840).is_ok());
        assert!(validate_utc_offset(-721).is_err());
        assert!(validate_utc_offset(900).is_err());
    }
}
