//! 位图：每组一块，第`i`项对应第`i / 8`字节中掩码为`0x80 >> (i % 8)`的位，置位表示已用

/// 从最低字节开始找第一个清零位，跳过全满的字节；
/// 字节内从最高位向最低位扫描。`reserved`之前的项永不返回，
/// `limit`及其之后的项不存在。
pub fn find_clear(map: &[u8], reserved: usize, limit: usize) -> Option<usize> {
    for (nth, &byte) in map.iter().enumerate() {
        if byte == 0xFF {
            continue;
        }
        if nth * 8 >= limit {
            return None;
        }
        for bit in (0..8).rev() {
            let index = nth * 8 + (7 - bit);
            if index < reserved {
                continue;
            }
            if index >= limit {
                return None;
            }
            if byte & (1 << bit) == 0 {
                return Some(index);
            }
        }
    }
    None
}

#[inline]
pub fn is_set(map: &[u8], index: usize) -> bool {
    map[index / 8] & mask(index) != 0
}

#[inline]
pub fn set(map: &mut [u8], index: usize) {
    map[index / 8] |= mask(index);
}

/// 已置位的项数
pub fn count_set(map: &[u8], limit: usize) -> usize {
    (0..limit.min(map.len() * 8))
        .filter(|&index| is_set(map, index))
        .count()
}

#[inline]
const fn mask(index: usize) -> u8 {
    0x80 >> (index % 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_bits() {
        let mut map = [0u8; 16];
        set(&mut map, 2);
        assert_eq!(1 << 5, map[0]);
        set(&mut map, 0);
        assert_eq!(1 << 7 | 1 << 5, map[0]);
    }

    #[test]
    fn scan_order() {
        let mut map = [0u8; 4];
        map[0] = 1 << 5;
        // 0..=2保留
        assert_eq!(Some(3), find_clear(&map, 3, 32));
        set(&mut map, 3);
        assert_eq!(Some(4), find_clear(&map, 3, 32));
        assert_eq!(Some(0), find_clear(&map, 0, 32));

        map[0] = 0xFF;
        map[1] = 0b1110_1111;
        assert_eq!(Some(11), find_clear(&map, 3, 32));
    }

    #[test]
    fn limits() {
        let mut map = [0u8; 4];
        for i in 0..10 {
            set(&mut map, i);
        }
        assert_eq!(None, find_clear(&map, 0, 10));
        assert_eq!(Some(10), find_clear(&map, 0, 11));
        assert_eq!(None, find_clear(&[0xFF; 4], 0, 32));
        assert_eq!(10, count_set(&map, 32));
        assert_eq!(4, count_set(&map, 4));
    }
}
