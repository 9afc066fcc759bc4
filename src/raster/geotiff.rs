//! GeoTIFF reading and writing on top of the `tiff` crate
//!
//! Only the subset of GeoTIFF needed for single-band factor grids is handled:
//! pixel scale + tiepoint or a full model transformation, an EPSG code from the
//! GeoKey directory, and the GDAL no-data tag.

use super::{Crs, GeoTransform};
use crate::error::{Result, SusceptibilityError};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tiff::ColorType;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// First band of a GeoTIFF with its georeferencing
#[derive(Debug, Clone)]
pub struct GeoTiffRaster {
    pub data: Array2<f64>,
    pub transform: GeoTransform,
    pub crs: Option<Crs>,
    pub nodata: Option<f64>,
}

/// Read the first band of a GeoTIFF file
pub fn read_geotiff(path: &Path) -> Result<GeoTiffRaster> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| format_error(path, format!("not a TIFF raster ({})", e)))?;

    let (width, height) = decoder.dimensions()?;
    let samples_per_pixel = match decoder.colortype()? {
        ColorType::Gray(_) => 1,
        ColorType::GrayA(_) => 2,
        ColorType::RGB(_) => 3,
        ColorType::RGBA(_) | ColorType::CMYK(_) => 4,
        other => {
            return Err(format_error(path, format!("unsupported band layout {:?}", other)));
        }
    };

    let transform = read_transform(&mut decoder)?
        .ok_or_else(|| format_error(path, "missing GeoTIFF georeferencing tags".to_string()))?;
    let crs = read_crs(&mut decoder)?;
    let nodata = read_nodata(&mut decoder)
        .map_err(|msg| format_error(path, msg))?;

    let values = decoding_to_f64(decoder.read_image()?);
    let (rows, cols) = (height as usize, width as usize);
    let expected = rows * cols * samples_per_pixel;
    if values.len() != expected {
        return Err(SusceptibilityError::ShapeError {
            expected: format!("{} samples for {}x{}", expected, rows, cols),
            actual: format!("{} samples", values.len()),
        });
    }

    let band: Vec<f64> = values.into_iter().step_by(samples_per_pixel).collect();
    let data = Array2::from_shape_vec((rows, cols), band)?;

    Ok(GeoTiffRaster {
        data,
        transform,
        crs,
        nodata,
    })
}

/// Write a single-band `f32` GeoTIFF
pub fn write_geotiff(
    path: &Path,
    data: &Array2<f64>,
    transform: &GeoTransform,
    crs: Option<Crs>,
    nodata: Option<f64>,
) -> Result<()> {
    let (rows, cols) = data.dim();
    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    let mut image = encoder.new_image::<colortype::Gray32Float>(cols as u32, rows as u32)?;

    {
        let dir = image.encoder();
        if transform.is_north_up() {
            let scale = [transform.a, -transform.e, 0.0];
            let tiepoint = [0.0, 0.0, 0.0, transform.c, transform.f, 0.0];
            dir.write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
            dir.write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
        } else {
            let matrix = [
                transform.a, transform.b, 0.0, transform.c,
                transform.d, transform.e, 0.0, transform.f,
                0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ];
            dir.write_tag(Tag::ModelTransformationTag, &matrix[..])?;
        }

        let geokeys = geokey_directory(crs);
        dir.write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])?;

        if let Some(nd) = nodata {
            let text = format_nodata(nd);
            dir.write_tag(Tag::GdalNodata, text.as_str())?;
        }
    }

    let pixels: Vec<f32> = data.iter().map(|&v| v as f32).collect();
    image.write_data(&pixels)?;
    Ok(())
}

fn format_error(path: &Path, msg: String) -> SusceptibilityError {
    SusceptibilityError::Format(format!("{}: {}", path.display(), msg))
}

fn read_transform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<Option<GeoTransform>> {
    if let Some(value) = decoder.find_tag(Tag::ModelTransformationTag)? {
        let m = value.into_f64_vec()?;
        if m.len() >= 8 {
            return Ok(Some(GeoTransform {
                a: m[0],
                b: m[1],
                c: m[3],
                d: m[4],
                e: m[5],
                f: m[7],
            }));
        }
    }

    let scale = match decoder.find_tag(Tag::ModelPixelScaleTag)? {
        Some(v) => v.into_f64_vec()?,
        None => return Ok(None),
    };
    let tiepoint = match decoder.find_tag(Tag::ModelTiepointTag)? {
        Some(v) => v.into_f64_vec()?,
        None => return Ok(None),
    };
    if scale.len() < 2 || tiepoint.len() < 6 {
        return Ok(None);
    }

    let (sx, sy) = (scale[0], scale[1]);
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    Ok(Some(GeoTransform {
        a: sx,
        b: 0.0,
        c: x - i * sx,
        d: 0.0,
        e: -sy,
        f: y + j * sy,
    }))
}

fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Result<Option<Crs>> {
    let keys = match decoder.find_tag(Tag::GeoKeyDirectoryTag)? {
        Some(v) => v.into_u16_vec()?,
        None => return Ok(None),
    };
    if keys.len() < 4 {
        return Ok(None);
    }

    let n_keys = keys[3] as usize;
    let mut projected = None;
    let mut geographic = None;
    for entry in keys[4..].chunks_exact(4).take(n_keys) {
        // entry = [key id, tag location, count, value]; location 0 means inline value
        if entry[1] != 0 {
            continue;
        }
        match entry[0] {
            PROJECTED_CS_TYPE_KEY => projected = Some(entry[3]),
            GEOGRAPHIC_TYPE_KEY => geographic = Some(entry[3]),
            _ => {}
        }
    }

    // 32767 is "user-defined" in the GeoTIFF spec
    Ok(match (projected, geographic) {
        (Some(code), _) if code != 32767 => Some(Crs::projected(code)),
        (_, Some(code)) if code != 32767 => Some(Crs::geographic(code)),
        _ => None,
    })
}

fn read_nodata<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> std::result::Result<Option<f64>, String> {
    let value = match decoder.find_tag(Tag::GdalNodata) {
        Ok(Some(v)) => v,
        Ok(None) => return Ok(None),
        Err(e) => return Err(format!("unreadable GDAL_NODATA tag ({})", e)),
    };
    let text = value
        .into_string()
        .map_err(|e| format!("GDAL_NODATA is not ASCII ({})", e))?;
    let trimmed = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    parse_nodata(trimmed)
        .map(Some)
        .ok_or_else(|| format!("unparsable GDAL_NODATA value '{}'", trimmed))
}

fn parse_nodata(text: &str) -> Option<f64> {
    match text.to_ascii_lowercase().as_str() {
        "nan" => Some(f64::NAN),
        "inf" | "+inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        other => other.parse::<f64>().ok(),
    }
}

fn format_nodata(nodata: f64) -> String {
    if nodata.is_nan() {
        "nan".to_string()
    } else {
        format!("{}", nodata)
    }
}

fn geokey_directory(crs: Option<Crs>) -> Vec<u16> {
    let mut keys: Vec<[u16; 4]> = Vec::new();
    if let Some(crs) = crs {
        let model = if crs.geographic { MODEL_TYPE_GEOGRAPHIC } else { MODEL_TYPE_PROJECTED };
        keys.push([GT_MODEL_TYPE_KEY, 0, 1, model]);
    }
    keys.push([GT_RASTER_TYPE_KEY, 0, 1, RASTER_PIXEL_IS_AREA]);
    if let Some(crs) = crs {
        let key = if crs.geographic { GEOGRAPHIC_TYPE_KEY } else { PROJECTED_CS_TYPE_KEY };
        keys.push([key, 0, 1, crs.epsg]);
    }

    let mut directory = vec![1, 1, 0, keys.len() as u16];
    for key in keys {
        directory.extend_from_slice(&key);
    }
    directory
}

fn decoding_to_f64(result: DecodingResult) -> Vec<f64> {
    match result {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_roundtrip_north_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slope.tif");
        let data = array![[1.0, 2.0, 3.0], [4.0, -9999.0, 6.0]];
        let transform = GeoTransform::north_up(500_000.0, 3_000_000.0, 30.0, 30.0);

        write_geotiff(&path, &data, &transform, Some(Crs::projected(32650)), Some(-9999.0)).unwrap();
        let raster = read_geotiff(&path).unwrap();

        assert_eq!(raster.data, data);
        assert_eq!(raster.transform, transform);
        assert_eq!(raster.crs, Some(Crs::projected(32650)));
        assert_eq!(raster.nodata, Some(-9999.0));
    }

    #[test]
    fn test_roundtrip_rotated_transform() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rotated.tif");
        let data = Array2::from_elem((2, 2), 0.5);
        let transform = GeoTransform { a: 10.0, b: 1.0, c: 100.0, d: 1.0, e: -10.0, f: 200.0 };

        write_geotiff(&path, &data, &transform, Some(Crs::geographic(4326)), None).unwrap();
        let raster = read_geotiff(&path).unwrap();

        assert_eq!(raster.transform, transform);
        assert_eq!(raster.crs, Some(Crs::geographic(4326)));
        assert_eq!(raster.nodata, None);
    }

    #[test]
    fn test_nan_nodata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nan.tif");
        let data = array![[f64::NAN, 0.25]];
        write_geotiff(&path, &data, &GeoTransform::default(), None, Some(f64::NAN)).unwrap();

        let raster = read_geotiff(&path).unwrap();
        assert!(raster.nodata.unwrap().is_nan());
        assert!(raster.data[[0, 0]].is_nan());
        assert_eq!(raster.data[[0, 1]], 0.25);
        assert_eq!(raster.crs, None);
    }

    #[test]
    fn test_not_a_tiff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.tif");
        std::fs::write(&path, b"definitely not a tiff").unwrap();
        assert!(matches!(read_geotiff(&path), Err(SusceptibilityError::Format(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = read_geotiff(Path::new("/nonexistent/factor.tif")).unwrap_err();
        assert!(matches!(err, SusceptibilityError::Io(_)));
    }

    #[test]
    fn test_parse_nodata() {
        assert_eq!(parse_nodata("-9999"), Some(-9999.0));
        assert!(parse_nodata("NaN").unwrap().is_nan());
        assert_eq!(parse_nodata("abc"), None);
    }
}
