/// Display version information
pub fn execute() {
    println!("shroud {}", env!("CARGO_PKG_VERSION"));
    println!("Privacy-preserving data contribution pipeline");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_execute() {
        execute();
    }
}
