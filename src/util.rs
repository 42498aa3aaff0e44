use crate::block::BlockSize;

// Parse a block size: "32" for a cube or "x,y,z" (also "XxYxZ").
pub fn parse_block_size(s: &str) -> Result<BlockSize, String> {
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return Err("block size is empty".into());
    }

    let parts: Vec<&str> = s.split([',', 'x', 'X']).collect();
    let dims = parts
        .iter()
        .map(|p| {
            p.parse::<i32>()
                .map_err(|_| format!("invalid block dimension '{p}' in '{s}'"))
        })
        .collect::<Result<Vec<i32>, String>>()?;

    let size = match dims.as_slice() {
        [n] => BlockSize::cubic(*n),
        [x, y, z] => BlockSize::new(*x, *y, *z),
        _ => return Err(format!("block size needs 1 or 3 dimensions: '{s}'")),
    };
    size.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_sizes() {
        assert_eq!(parse_block_size("32").unwrap(), BlockSize::cubic(32).unwrap());
        assert_eq!(
            parse_block_size("64, 64, 16").unwrap(),
            BlockSize::new(64, 64, 16).unwrap()
        );
        assert_eq!(
            parse_block_size("8x4x2").unwrap(),
            BlockSize::new(8, 4, 2).unwrap()
        );
        assert!(parse_block_size("").is_err());
        assert!(parse_block_size("8,8").is_err());
        assert!(parse_block_size("0").is_err());
        assert!(parse_block_size("a,b,c").is_err());
    }
}
