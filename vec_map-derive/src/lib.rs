/*!
 `macro_attr!` derive helpers implementing `vec_map::Token` and `vec_map::NumericIndex` for
 tuple structs wrapping a single `usize`.
*/

#[macro_export]
macro_rules! Token {
    (() $(pub)* struct $name:ident($(pub)* usize);) => {
        impl vec_map::Token for $name {
            fn from_numeric_index(index: usize) -> Self {
                $name(index)
            }
        }
    };
}

#[macro_export]
macro_rules! NumericIndex {
    (() $(pub)* struct $name:ident($(pub)* usize);) => {
        impl vec_map::NumericIndex for $name {
            fn get_numeric_index(&self) -> usize {
                self.0
            }
        }
    };
}
