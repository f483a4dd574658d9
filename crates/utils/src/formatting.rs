use std::fmt::Display;

pub fn format_opt<T: Display>(opt: Option<&T>) -> String {
    opt.map_or("None".to_owned(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::format_opt;

    #[test]
    fn formats_optional_values() {
        assert_eq!(format_opt(Some(&7)), "7");
        assert_eq!(format_opt::<u32>(None), "None");
    }
}
